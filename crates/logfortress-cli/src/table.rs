//! Plain text tables for listings.

use logfortress_core::{ContainerSummary, CustomSourceRow, NetworkSummary};

pub fn print_running(containers: &[ContainerSummary]) {
    let rows: Vec<Vec<String>> = containers
        .iter()
        .map(|c| {
            vec![
                c.short_id().to_string(),
                c.name.clone(),
                c.primary_image_tag.clone(),
                c.status.to_string(),
            ]
        })
        .collect();
    print_table(&["ID", "Name", "Image", "Status"], &rows);
}

pub fn print_custom(rows: &[CustomSourceRow]) {
    let rows: Vec<Vec<String>> = rows
        .iter()
        .map(|row| {
            vec![
                row.id().to_string(),
                row.name.clone(),
                row.image().to_string(),
                row.path.clone(),
                row.status(),
            ]
        })
        .collect();
    print_table(
        &["ID", "Container Name", "Image", "Log File Path", "Status"],
        &rows,
    );
}

pub fn print_networks(networks: &[NetworkSummary]) {
    for network in networks {
        println!("{} ({})", network.name, network.id.get(..12).unwrap_or(&network.id));
        if network.containers.is_empty() {
            println!("  (no containers)");
        }
        for member in &network.containers {
            println!("  {}  {}", member.id.get(..12).unwrap_or(&member.id), member.name);
        }
    }
}

fn print_table(headers: &[&str], rows: &[Vec<String>]) {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let render = |cells: Vec<&str>| {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, &width)| format!("{cell:<width$}"))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    println!("{}", render(headers.to_vec()));
    println!(
        "{}",
        widths
            .iter()
            .map(|w| "=".repeat(*w))
            .collect::<Vec<_>>()
            .join("  ")
    );
    for row in rows {
        println!("{}", render(row.iter().map(String::as_str).collect()));
    }
}
