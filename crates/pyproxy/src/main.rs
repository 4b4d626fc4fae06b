use anyhow::Context as _;
use pyproxy::{
    list_interpreter_states, opts::Opts, BuildVersion, LayoutRegistry, LayoutTable,
    LinkedList, Linked, ProcessHandle, RuntimeInfo, SymbolTable,
};
use std::{fs::File, sync::Arc};

fn try_main() -> anyhow::Result<()> {
    env_logger::init();

    let opts = pyproxy::opts::opts()?;
    let handle = attach(&opts)?;

    println!("process {}: {}", handle.id(), handle.version());

    let interps = limit(list_interpreter_states(&handle)?, opts.limit);

    for interp in interps {
        let interp = interp.context("failed to read interpreter")?;
        println!("{:?}", interp);

        if let Ok(id) = interp.id() {
            println!("  id: {}", id.read()?);
        }

        if let Some(modules) = interp.modules()?.try_deref()? {
            println!("  modules: {} ({} entries)", modules.address(), modules.ma_used()?.read()?);
        }

        for thread in limit(interp.thread_states()?, opts.limit) {
            let thread = thread.context("failed to read thread")?;

            println!(
                "  {:?}: thread_id = {}, frame = {}",
                thread,
                thread.thread_id()?.read()?,
                thread.frame()?.read()?
            );
        }
    }

    handle.detach();
    Ok(())
}

fn limit<S>(list: LinkedList<'_, S>, limit: Option<usize>) -> LinkedList<'_, S>
where
    S: Linked,
{
    match limit {
        Some(limit) => list.with_limit(limit),
        None => list,
    }
}

/// Build a handle for the process described by the options.
fn attach(opts: &Opts) -> anyhow::Result<ProcessHandle> {
    let mut symbols = SymbolTable::new();

    for path in &opts.symbol_files {
        let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
        let table = SymbolTable::from_reader(file)
            .with_context(|| format!("failed to load symbols from {}", path.display()))?;
        symbols.extend(table);
    }

    for (name, address) in &opts.symbols {
        symbols.insert(&opts.module, name, *address);
    }

    let mut tables = Vec::new();

    for path in &opts.layout_files {
        let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
        let list = LayoutTable::list_from_reader(file)
            .with_context(|| format!("failed to load layouts from {}", path.display()))?;
        tables.extend(list);
    }

    let layouts = LayoutRegistry::new().with_override(tables);

    let runtime = RuntimeInfo {
        version: BuildVersion::new(opts.python, opts.target),
        module: opts.module.clone(),
    };

    let handle = ProcessHandle::builder(opts.pid, runtime).layouts(Arc::new(layouts));
    Ok(handle.build(open_reader(opts.pid)?, symbols))
}

#[cfg(unix)]
fn open_reader(pid: u32) -> anyhow::Result<pyproxy::ProcMemReader> {
    pyproxy::ProcMemReader::open(pid)
        .with_context(|| format!("failed to open memory of process {}", pid))
}

#[cfg(not(unix))]
fn open_reader(pid: u32) -> anyhow::Result<pyproxy::MemoryMap> {
    anyhow::bail!("reading the memory of process {} is not supported on this platform", pid)
}

fn main() {
    if let Err(e) = try_main() {
        eprintln!("error: {}", e);

        for c in e.chain().skip(1) {
            eprintln!("caused by: {}", c);
        }

        std::process::exit(1);
    }
}
