use clap::Parser;
use miette::Result;
use fmeca::cli::{commands, init_logging, Cli, Commands};

fn main() -> Result<()> {
    // Reset SIGPIPE to default behavior (terminate silently) for proper Unix piping.
    // Without this, piping to `head` causes a panic on broken pipe.
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
    init_logging(&global);

    match cli.command {
        Commands::Init(args) => commands::init::run(args),
        Commands::Import(args) => commands::import::run(args, &global),
        Commands::Export(args) => commands::export::run(args, &global),
        Commands::Show(args) => commands::show::run(args, &global),
        Commands::Diff(args) => commands::diff::run(args, &global),
        Commands::Propose(args) => commands::propose::run(args, &global),
        Commands::Edit(args) => commands::edit::run(args, &global),
        Commands::Delete(args) => commands::delete::run(args, &global),
        Commands::Accept(args) => commands::accept::run(args, &global),
        Commands::Revert(args) => commands::revert::run(args, &global),
        Commands::Status(args) => commands::status::run(args, &global),
        Commands::Completions(args) => commands::completions::run(args),
    }
}
