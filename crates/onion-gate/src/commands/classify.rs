use anyhow::Result;
use comfy_table::{Cell, Color, Table};
use readiness_dispatch::{DomainClass, classify};

pub async fn run(hosts: Vec<String>) -> Result<()> {
    let mut table = Table::new();
    table.set_header(vec!["Host", "Class", "Gated"]);

    for host in &hosts {
        let class = classify(host);
        let (label, color) = match class {
            DomainClass::Intercepted => ("intercepted", Color::Yellow),
            DomainClass::AnonymizedAddress => ("onion", Color::Magenta),
            DomainClass::Other => ("other", Color::Reset),
        };
        table.add_row(vec![
            Cell::new(host),
            Cell::new(label).fg(color),
            Cell::new(if class.is_gated() { "yes" } else { "no" }),
        ]);
    }

    println!("{table}");
    Ok(())
}
