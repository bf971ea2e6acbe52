use std::fs::File;
use std::io::Write;
use tempfile::NamedTempFile;
use tilesplit::{DensityMap, SplitConfig, SplitError, TileSplitter};
use tilesplit_types::area::Area;

fn sample_map() -> DensityMap {
    let mut map = DensityMap::new(Area::new(0, 0, 4096, 4096), 16).expect("Failed to create map");
    for i in 0..4000 {
        let lat = (i * 37) % 4096;
        let lon = (i * 101) % 4096;
        map.add_node(lat, lon);
    }
    map
}

#[test]
fn test_density_file_round_trip() {
    let map = sample_map();
    let file = NamedTempFile::new().expect("Failed to create temp file");
    map.write_to(File::create(file.path()).unwrap())
        .expect("Failed to write density map");

    let loaded = DensityMap::read_from(File::open(file.path()).unwrap())
        .expect("Failed to read density map");
    assert_eq!(loaded.bounds(), map.bounds());
    assert_eq!(loaded.resolution(), map.resolution());
    assert_eq!(loaded.total(), map.total());
    for x in 0..map.width() {
        for y in 0..map.height() {
            assert_eq!(loaded.node_count(x, y), map.node_count(x, y));
        }
    }

    let config = SplitConfig::default().with_resolution(16).with_max_nodes(500);
    let original = TileSplitter::new(map, config.clone()).unwrap().split_map();
    let reloaded = TileSplitter::new(loaded, config).unwrap().split_map();
    assert_eq!(original.tiles, reloaded.tiles);
}

#[test]
fn test_reject_bad_header() {
    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    writeln!(file, "not a density file").unwrap();
    let result = DensityMap::read_from(File::open(file.path()).unwrap());
    assert!(matches!(result, Err(SplitError::InvalidInput(_))));
}

#[test]
fn test_reject_cell_outside_map() {
    let text = "tilesplit-density 1\nresolution 20\nbounds 0 0 32 32\n2 0 5\n";
    let result = DensityMap::read_from(text.as_bytes());
    assert!(matches!(result, Err(SplitError::InvalidInput(_))));
}

#[test]
fn test_reject_unaligned_bounds() {
    let text = "tilesplit-density 1\nresolution 20\nbounds 0 0 30 32\n";
    let result = DensityMap::read_from(text.as_bytes());
    assert!(matches!(result, Err(SplitError::InvalidInput(_))));
}
