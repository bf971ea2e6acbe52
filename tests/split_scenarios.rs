use tilesplit::{
    AreaDictionary, AreaSet, DensityMap, DictionaryConfig, IdWidth, SplitConfig, SplitError, Tile,
    TileSplitter,
};
use tilesplit_types::area::Area;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// One cell holding a million nodes cannot be divided further.
#[test]
fn test_single_dense_cluster() {
    init_logging();
    let text = "tilesplit-density 1\nresolution 20\nbounds 0 0 256 256\n5 9 1000000\n";
    let map = DensityMap::read_from(text.as_bytes()).expect("Failed to read density map");
    assert_eq!(map.total(), 1_000_000);

    let splitter = TileSplitter::new(map, SplitConfig::default().with_resolution(20))
        .expect("Failed to create splitter");
    let result = splitter.split(splitter.root_tile(), 400_000);

    assert!(!result.tiles.is_empty());
    assert!(result.tiles.iter().all(Tile::is_single_cell));
    assert_eq!(result.oversized.len(), 1);
    assert_eq!(result.tiles[result.oversized[0]].count, 1_000_000);
    assert_eq!(result.total_count(), 1_000_000);
}

/// Four equal cells with a limit just below half the total give one tile per cell.
#[test]
fn test_even_two_by_two_grid() {
    init_logging();
    let mut map = DensityMap::new(Area::new(0, 0, 32, 32), 20).expect("Failed to create map");
    assert_eq!((map.width(), map.height()), (2, 2));
    for (lat, lon) in [(0, 0), (0, 16), (16, 0), (16, 16)] {
        for _ in 0..1000 {
            map.add_node(lat, lon);
        }
    }

    let splitter = TileSplitter::new(map, SplitConfig::default().with_resolution(20))
        .expect("Failed to create splitter");
    let result = splitter.split(splitter.root_tile(), 1999);

    assert_eq!(result.tiles.len(), 4);
    assert!(!result.has_oversized());
    let mut cells: Vec<(usize, usize)> = result.tiles.iter().map(|t| (t.x, t.y)).collect();
    cells.sort_unstable();
    assert_eq!(cells, vec![(0, 0), (0, 1), (1, 0), (1, 1)]);
    for tile in &result.tiles {
        assert!(tile.is_single_cell());
        assert_eq!(tile.count, 1000);
        let ratio = tile.aspect_ratio(&tilesplit::AspectModel::new(splitter.map()));
        assert!(ratio > 0.99 && ratio < 1.01, "aspect ratio {ratio}");
    }
}

/// Interning more combinations than 16-bit ids allow is a hard error.
#[test]
fn test_dictionary_overflow() {
    let tiles: Vec<Area> = (0..20)
        .map(|i| Area::new(0, i * 1000, 999, i * 1000 + 999))
        .collect();
    let config = DictionaryConfig::default().with_id_width(IdWidth::U16);
    let mut dict = AreaDictionary::new(tiles, 0, &config).expect("Failed to create dictionary");

    let mut overflow = None;
    for bits in 1u32..(1 << 20) {
        let set = AreaSet::from_tiles((0..20).filter(|i| bits & (1 << i) != 0), 20);
        if let Err(err) = dict.intern(set) {
            overflow = Some(err);
            break;
        }
    }

    match overflow {
        Some(SplitError::DictionaryFull { capacity }) => assert_eq!(capacity, 65_535),
        other => panic!("expected a full dictionary, got {other:?}"),
    }
    assert_eq!(dict.len(), 65_535);
}

#[test]
fn test_config_errors_are_reported() {
    let map = DensityMap::new(Area::new(0, 0, 32, 32), 20).expect("Failed to create map");
    let config = SplitConfig::default().with_resolution(25);
    assert!(matches!(
        TileSplitter::new(map, config),
        Err(SplitError::InvalidResolution(25))
    ));
    assert!(SplitConfig::from_json_str(r#"{ "max_nodes": 0 }"#).is_err());
    assert!(SplitConfig::from_json_str(r#"{ "unknown": 1 }"#).is_err());
}
