//! Terminal prompts. All of these block; async callers wrap them in
//! `spawn_blocking`.

use std::io::Read;

use dialoguer::{Confirm, Input, Password};

use crate::errors::CliError;

pub fn prompt_password(prompt: &str) -> anyhow::Result<String> {
    Password::new()
        .with_prompt(prompt)
        .interact()
        .map_err(|e| anyhow::anyhow!("Password prompt failed: {}", e))
}

/// Ask for a new password twice.
pub fn prompt_new_password(prompt: &str) -> anyhow::Result<String> {
    let password = Password::new()
        .with_prompt(prompt)
        .with_confirmation("Confirm password", "Passwords do not match")
        .interact()
        .map_err(|e| anyhow::anyhow!("Password prompt failed: {}", e))?;
    if password.trim().is_empty() {
        return Err(CliError::invalid_input("Password cannot be empty").into());
    }
    Ok(password)
}

/// Read one line. An empty answer is allowed.
pub fn prompt_line(prompt: &str, initial: &str) -> anyhow::Result<String> {
    Input::<String>::new()
        .with_prompt(prompt)
        .with_initial_text(initial)
        .allow_empty(true)
        .interact_text()
        .map_err(|e| anyhow::anyhow!("Input prompt failed: {}", e))
}

pub fn confirm(prompt: &str) -> anyhow::Result<bool> {
    Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()
        .map_err(|e| anyhow::anyhow!("Confirmation prompt failed: {}", e))
}

/// Read a file, or stdin for `-`.
pub fn read_input(path: &str) -> anyhow::Result<String> {
    if path == "-" {
        let mut buffer = String::new();
        std::io::stdin().read_to_string(&mut buffer)?;
        return Ok(buffer);
    }
    std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            CliError::not_found(format!("File {} not found", path), "Check the path.").into()
        } else {
            anyhow::anyhow!("Failed to read {}: {}", path, e)
        }
    })
}
