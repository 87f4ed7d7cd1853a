use clap::Parser;
use miette::Result;
use partdb::cli::{logging, Cli, Commands};
use partdb::core::{Config, Workspace};

fn main() -> Result<()> {
    // Reset SIGPIPE to default behavior (terminate silently) for proper Unix piping.
    // Without this, piping to `head`, `grep -q`, etc. causes a panic on broken pipe.
    #[cfg(unix)]
    {
        unsafe {
            libc::signal(libc::SIGPIPE, libc::SIG_DFL);
        }
    }
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(2)
                .tab_width(4)
                .build(),
        )
    }))?;

    let cli = Cli::parse();
    let global = cli.global;

    let workspace = match &global.project {
        Some(path) => Workspace::discover_from(path).ok(),
        None => Workspace::discover().ok(),
    };
    let config = Config::load_for(workspace.as_ref());
    logging::init(&logging::filter_directive(
        std::env::var(logging::LOG_ENV).ok(),
        &global,
        &config,
    ));

    match cli.command {
        Commands::Init(args) => partdb::cli::commands::init::run(args),
        Commands::Part(cmd) => partdb::cli::commands::part::run(cmd, &global),
        Commands::Loc(cmd) => partdb::cli::commands::loc::run(cmd, &global),
        Commands::Lot(cmd) => partdb::cli::commands::lot::run(cmd, &global),
        Commands::Prj(cmd) => partdb::cli::commands::prj::run(cmd, &global),
        Commands::Asm(cmd) => partdb::cli::commands::asm::run(cmd, &global),
        Commands::Build(cmd) => partdb::cli::commands::build::run(cmd, &global),
        Commands::Log(args) => partdb::cli::commands::log::run(args, &global),
        Commands::Completions(args) => partdb::cli::commands::completions::run(args),
    }
}
