//! `devices` command

use nuflash_nulink::usb;

/// List attached programmers and query their firmware versions
pub fn list_devices() -> Result<(), Box<dyn std::error::Error>> {
    let programmers = usb::list_programmers()?;
    if programmers.is_empty() {
        println!("No programmers found");
        return Ok(());
    }

    for programmer in &programmers {
        let version = programmer
            .open()
            .and_then(|mut session| session.get_version());
        match version {
            Ok(version) => println!("[{}] {}", programmer, version),
            Err(e) => println!("[{}] {}: {}", programmer, programmer.model().name, e),
        }
    }
    Ok(())
}
