use std::env;
use std::io::{self, BufRead, Write};

/// Prints a bcrypt hash for the given password, for seeding user files
/// by hand. Reads the password from the first argument, or from stdin
/// when no argument is given.
fn main() {
    let password = match env::args().nth(1) {
        Some(password) => password,
        None => prompt().expect("Failed to read password from stdin"),
    };

    let password = password.trim_end_matches(['\r', '\n']);
    if password.is_empty() {
        eprintln!("Usage: hash_password <password>");
        std::process::exit(1);
    }

    let hash = bcrypt::hash(password, bcrypt::DEFAULT_COST).expect("Failed to hash password");

    println!("{}", hash);
}

fn prompt() -> io::Result<String> {
    print!("Password: ");
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line)
}
