use colored::Colorize;

pub fn subheader(title: &str) {
    println!("{}", title.bold());
}

pub fn kv(key: &str, value: impl std::fmt::Display) {
    println!("  {:<12} {}", format!("{key}:").dimmed(), value);
}

pub fn info(msg: &str) {
    eprintln!("{} {}", "info:".blue().bold(), msg);
}

pub fn error(msg: &str) {
    eprintln!("{} {}", "error:".red().bold(), msg);
}

pub fn success(msg: &str) {
    eprintln!("{} {}", "✓".green().bold(), msg);
}
