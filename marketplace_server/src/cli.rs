use std::{env, env::VarError};

/// The server is configured entirely from the environment. Any argument at all (`--help`, `-h`, ...) prints the
/// help text and the current configuration, and returns true so that the caller can exit.
pub fn handle_command_line_args() -> bool {
    let wants_help = env::args().len() > 1;
    if wants_help {
        display_readme();
        display_envs();
    }
    wants_help
}

fn display_readme() {
    const README: &str = include_str!("./cli-help.txt");
    println!("\n{README}\n");
}

fn display_envs() {
    // API keys and signing secrets are deliberately absent from this list
    const DISPLAY_ENVS: [&str; 12] = [
        "RUST_LOG",
        "MKT_HOST",
        "MKT_PORT",
        "MKT_DATABASE_URL",
        "MKT_DEFAULT_COUNTRY",
        "MKT_USE_X_FORWARDED_FOR",
        "MKT_USE_FORWARDED",
        "MKT_GEOIP_URL",
        "MKT_EVENT_BUFFER_SIZE",
        "MKT_STRIPE_API_URL",
        "MKT_STRIPE_WEBHOOK_CHECKS",
        "MKT_STRIPE_WEBHOOK_TOLERANCE",
    ];

    println!("Marketplace configuration (secrets are not shown):");
    DISPLAY_ENVS.iter().for_each(|&name| {
        let val = match env::var(name) {
            Ok(s) => s,
            Err(VarError::NotPresent) => "Not set".into(),
            Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
        };
        println!("  {name:<35} {val:<15}");
    })
}
