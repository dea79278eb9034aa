use std::io::IsTerminal;

use serde::Serialize;
use tapo_core::{Color, Credentials};

use crate::cli::ColorCommand;

/// Read password securely based on the provided options.
///
/// # Priority
///
/// 1. If `password_stdin` is true, read from stdin
/// 2. Otherwise, prompt interactively (if terminal is available)
pub fn read_password(password_stdin: bool, prompt: &str) -> Result<String, String> {
    if password_stdin {
        let mut input = String::new();
        std::io::stdin()
            .read_line(&mut input)
            .map_err(|e| format!("Failed to read password from stdin: {}", e))?;
        return Ok(input.trim().to_string());
    }

    if std::io::stdin().is_terminal() {
        eprint!("{}: ", prompt);
        rpassword::read_password().map_err(|e| format!("Failed to read password: {}", e))
    } else {
        Err("No password provided. Use --password-stdin when piping input.".to_string())
    }
}

/// Get credentials from CLI options and environment.
///
/// Password is read from TAPO_PASSWORD env var, stdin (if --password-stdin),
/// or interactively prompted.
pub fn get_credentials(
    username: Option<String>,
    password_stdin: bool,
) -> Result<Credentials, String> {
    let Some(user) = username else {
        return Err(
            "No username provided. Use --username or set TAPO_USERNAME.".to_string(),
        );
    };

    if let Ok(pass) = std::env::var("TAPO_PASSWORD") {
        return Ok(Credentials::new(user, pass));
    }

    let prompt = format!("Password for {}", user);
    let pass = read_password(password_stdin, &prompt)?;
    Ok(Credentials::new(user, pass))
}

/// Convert a color subcommand into a [`Color`].
pub fn parse_color(command: &ColorCommand) -> Result<Color, String> {
    match command {
        ColorCommand::Hex { value } => Color::from_hex(value).map_err(|e| e.to_string()),
        ColorCommand::Rgb { value } => Color::from_rgb_str(value).map_err(|e| e.to_string()),
        ColorCommand::Temp { kelvin } => Ok(Color::from_temperature(*kelvin, None)),
    }
}

/// Parse optional `--params` JSON.
pub fn parse_params(params: Option<&str>) -> Result<Option<serde_json::Value>, String> {
    params
        .map(|p| serde_json::from_str(p).map_err(|e| format!("Invalid --params JSON: {}", e)))
        .transpose()
}

/// Print a value as JSON on stdout.
pub fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Error: Failed to serialize output: {}", e);
            std::process::exit(1);
        }
    }
}

/// Print an error and exit with status 1.
pub fn fail(context: &str, err: impl std::fmt::Display) -> ! {
    tracing::error!(error = %err, "{}", context);
    eprintln!("Error: {}: {}", context, err);
    std::process::exit(1);
}
