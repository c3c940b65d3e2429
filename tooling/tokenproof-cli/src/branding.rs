use colored::*;

pub fn print_logo() {
    let logo = r#"
  _        _                                     __
 | |_ ___ | | _____ _ __  _ __  _ __ ___   ___  / _|
 | __/ _ \| |/ / _ \ '_ \| '_ \| '__/ _ \ / _ \| |_
 | || (_) |   <  __/ | | | |_) | | | (_) | (_) |  _|
  \__\___/|_|\_\___|_| |_| .__/|_|  \___/ \___/|_|
                         |_|
"#;
    println!("{}", logo.cyan().bold());
    println!(
        "{}",
        "      Differential Conformance Testing for Fungible Tokens"
            .white()
            .italic()
    );
    println!("{}", "      v0.1.0 | Model, Oracle, Fuzz, Shrink".dimmed());
    println!();
}
