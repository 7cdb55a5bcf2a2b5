use super::*;
use image::{Rgba, RgbaImage};
use pretty_assertions::assert_eq;

const EMPTY_SHA256: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

#[test]
fn test_url_hash_is_lowercase_hex_sha256() {
    assert_eq!(url_hash(""), EMPTY_SHA256);
    let digest = url_hash("http://example.com/");
    assert_eq!(digest.len(), 64);
    assert!(digest.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
}

#[test]
fn test_artifact_stem_without_suffix() {
    let stem = artifact_stem(12, "", "");
    assert_eq!(stem, format!("12-{EMPTY_SHA256}"));
}

#[test]
fn test_artifact_stem_with_suffix() {
    let stem = artifact_stem(12, "", "post-consent");
    assert_eq!(stem, format!("12-{EMPTY_SHA256}-post-consent"));
}

#[test]
fn test_parse_part_name() {
    assert_eq!(parse_part_name("7-abc-part-0-0.png", "7-abc-part-"), Some((0, 0)));
    assert_eq!(parse_part_name("7-abc-part-3-2250.png", "7-abc-part-"), Some((3, 2250)));
}

#[test]
fn test_parse_part_name_rejects_foreign_files() {
    let prefix = "7-abc-part-";
    assert_eq!(parse_part_name("8-abc-part-0-0.png", prefix), None);
    assert_eq!(parse_part_name("7-abc-part-0-0.jpg", prefix), None);
    assert_eq!(parse_part_name("7-abc-part-x-0.png", prefix), None);
    assert_eq!(parse_part_name("7-abc.png", prefix), None);
}

fn write_part(dir: &std::path::Path, name: &str, width: u32, height: u32, color: Rgba<u8>) {
    let img = RgbaImage::from_pixel(width, height, color);
    img.save(dir.join(name)).unwrap();
}

#[test]
fn test_stitch_parts_composites_at_scroll_offsets() {
    let dir = tempfile::tempdir().unwrap();
    let parts_dir = dir.path().join("parts");
    std::fs::create_dir_all(&parts_dir).unwrap();

    // Two viewport captures of a 1550px page: the second scrolled to 750
    let red = Rgba([255, 0, 0, 255]);
    let blue = Rgba([0, 0, 255, 255]);
    write_part(&parts_dir, "3-feed-part-0-0.png", 100, 800, red);
    write_part(&parts_dir, "3-feed-part-1-750.png", 100, 800, blue);

    let out = stitch_parts(&parts_dir, dir.path(), "3-feed").unwrap();
    assert_eq!(out, dir.path().join("3-feed.png"));

    let stitched = image::open(&out).unwrap().to_rgba8();
    assert_eq!(stitched.dimensions(), (100, 1550));
    assert_eq!(*stitched.get_pixel(50, 10), red);
    // The later part wins the 750..800 overlap
    assert_eq!(*stitched.get_pixel(50, 760), blue);
    assert_eq!(*stitched.get_pixel(50, 1549), blue);
}

#[test]
fn test_stitch_parts_sizes_canvas_from_deepest_part() {
    let dir = tempfile::tempdir().unwrap();
    let parts_dir = dir.path().join("parts");
    std::fs::create_dir_all(&parts_dir).unwrap();

    // A short, narrower final capture taken far below the first one
    let red = Rgba([255, 0, 0, 255]);
    let blue = Rgba([0, 0, 255, 255]);
    let clear = Rgba([0, 0, 0, 0]);
    write_part(&parts_dir, "6-feed-part-0-0.png", 100, 800, red);
    write_part(&parts_dir, "6-feed-part-1-1400.png", 80, 150, blue);

    let out = stitch_parts(&parts_dir, dir.path(), "6-feed").unwrap();
    let stitched = image::open(&out).unwrap().to_rgba8();

    // Height is the deepest offset plus that part's height, not 800 + 150
    assert_eq!(stitched.dimensions(), (100, 1550));
    assert_eq!(*stitched.get_pixel(50, 10), red);
    assert_eq!(*stitched.get_pixel(50, 1450), blue);
    // Rows between the parts and columns past the narrow part stay blank
    assert_eq!(*stitched.get_pixel(50, 900), clear);
    assert_eq!(*stitched.get_pixel(90, 1450), clear);
}

#[test]
fn test_stitch_parts_ignores_other_visits() {
    let dir = tempfile::tempdir().unwrap();
    let parts_dir = dir.path().join("parts");
    std::fs::create_dir_all(&parts_dir).unwrap();

    let green = Rgba([0, 255, 0, 255]);
    write_part(&parts_dir, "4-feed-part-0-0.png", 50, 40, green);
    write_part(&parts_dir, "9-feed-part-0-0.png", 999, 999, green);

    let out = stitch_parts(&parts_dir, dir.path(), "4-feed").unwrap();
    let (width, height) = image::image_dimensions(&out).unwrap();
    assert_eq!((width, height), (50, 40));
}

#[test]
fn test_stitch_parts_without_parts_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let parts_dir = dir.path().join("parts");
    std::fs::create_dir_all(&parts_dir).unwrap();

    let result = stitch_parts(&parts_dir, dir.path(), "5-feed");
    assert!(result.is_err());
}
