//! `program` command

use nuflash_core::image::compose;
use nuflash_core::target::TargetDefinition;
use nuflash_nulink::usb;

use super::progress::IndicatifProgress;
use crate::cli::ImageArgs;
use crate::files;

/// Compose the image, then erase and program the target
pub fn run_program(
    target: &TargetDefinition,
    input: ImageArgs,
    verify: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    // Fail on bad inputs before touching the hardware
    let sources = super::image_sources(target, input, true)?;
    let image = compose(target, sources, true, |path: &String| files::open_read(path))?;
    let split = image.split()?;

    let mut conn = usb::connect(target)?;
    let mut progress = IndicatifProgress::new();

    conn.program_image(&image, &mut progress)?;
    if verify {
        conn.verify_image(&image, &mut progress)?;
    }
    progress.finish();
    conn.close();

    println!(
        "Programmed {}: {} bytes APROM, {} bytes LDROM{}",
        target.name,
        split.program_size,
        split.loader_size,
        if verify { ", verified" } else { "" }
    );
    Ok(())
}
