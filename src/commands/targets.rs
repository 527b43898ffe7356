//! `targets` command

use nuflash_core::target::TargetRegistry;

fn format_size(bytes: usize) -> String {
    if bytes >= 1024 {
        format!("{} KiB", bytes / 1024)
    } else {
        format!("{} B", bytes)
    }
}

/// List all supported target devices
pub fn list_targets(registry: &TargetRegistry) {
    println!("Supported target devices:");
    println!();
    println!(
        "{:<12} {:<12} {:<12} {:>10} {:>8}",
        "Name", "Family", "Device ID", "Flash", "LDROM at"
    );
    println!("{}", "-".repeat(58));

    for target in registry.iter() {
        println!(
            "{:<12} {:<12} {:<12} {:>10} {:>#8X}",
            target.name,
            target.family.to_string(),
            target.device_id.to_string(),
            format_size(target.program_memory_size),
            target.loader_offset
        );
    }
}
