//! Nickname command implementation

use std::path::Path;

use anyhow::{Context, Result};

use cl_core::DisplayIdentity;

use crate::output::{print_info, print_success};

/// Show or set the display name used for games
pub fn nickname_command(identity_path: &Path, name: Option<&str>) -> Result<()> {
    match name {
        Some(name) => {
            let identity = DisplayIdentity::new(name)?;
            identity
                .save(identity_path)
                .with_context(|| format!("Failed to save nickname to {:?}", identity_path))?;
            print_success(&format!("Nickname set to {}", identity.nickname()));
        }
        None => match DisplayIdentity::load(identity_path)? {
            Some(identity) => println!("{}", identity.nickname()),
            None => print_info("No nickname set. Run 'codelab nickname <name>' to choose one"),
        },
    }

    Ok(())
}
