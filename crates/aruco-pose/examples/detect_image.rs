use aruco_pose::core::init_with_level;
use aruco_pose::{builtins, MarkerLocalizer, PixelBuffer};
use image::ImageReader;
use nalgebra::Matrix3;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_with_level(log::LevelFilter::Info)?;

    let Some(path) = std::env::args().nth(1) else {
        eprintln!("Usage: detect_image <image_path> [marker_size]");
        return Ok(());
    };
    let marker_size: f64 = std::env::args()
        .nth(2)
        .map(|s| s.parse())
        .transpose()?
        .unwrap_or(0.05);

    let img = ImageReader::open(path)?.decode()?.to_luma8();
    let (w, h) = (img.width() as usize, img.height() as usize);
    let frame = PixelBuffer::gray(w, h, img.as_raw());

    // Rough intrinsics for an uncalibrated image: focal length equal to the
    // image width, principal point at the center.
    let f = w as f64;
    let camera = Matrix3::new(
        f,
        0.0,
        w as f64 / 2.0,
        0.0,
        f,
        h as f64 / 2.0,
        0.0,
        0.0,
        1.0,
    );

    let localizer = MarkerLocalizer::with_defaults(builtins::DICT_4X4_50);
    let markers = localizer.estimate_pose(&frame, &camera, marker_size)?;

    if markers.is_empty() {
        println!("no markers detected");
    }
    for m in &markers {
        println!(
            "marker {:3}  position [{:+.3} {:+.3} {:+.3}]  rvec [{:+.3} {:+.3} {:+.3}]  hamming {}",
            m.id,
            m.position.x,
            m.position.y,
            m.position.z,
            m.rotation_vector().x,
            m.rotation_vector().y,
            m.rotation_vector().z,
            m.hamming,
        );
    }

    Ok(())
}
