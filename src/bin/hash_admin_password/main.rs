//! Prints an Argon2 hash for `admin.password_hash`.
//!
//! Usage: `hash-admin-password <password>`, or pipe the password on stdin.

use std::io::BufRead;

fn main() -> anyhow::Result<()> {
    let password = match std::env::args().nth(1) {
        Some(password) => password,
        None => {
            let mut line = String::new();
            std::io::stdin().lock().read_line(&mut line)?;
            line.trim_end_matches(&['\r', '\n'][..]).to_owned()
        }
    };

    if password.is_empty() {
        anyhow::bail!("refusing to hash an empty password");
    }

    let hash = charity_gallery::session::hash_password(&password)
        .map_err(|e| anyhow::anyhow!("failed to hash password: {}", e))?;
    println!("{}", hash);

    Ok(())
}
