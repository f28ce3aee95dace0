//! End-to-end decoder scenarios over synthetic files.

mod common;

use pretty_assertions::assert_eq;

use common::{
    FileBuilder, RetailMcnk, alpha_mcnk, doodad_placement, object_placement, rle_copy_encode,
};
use wow_terrain::records::{ALPHA_MAP_SIZE, MAP_RESOLUTION};
use wow_terrain::{Format, MemorySink, ModelKind, ParseOptions, parse_bytes};

fn zero_heights() -> [f32; 145] {
    [0.0; 145]
}

#[test]
fn minimal_retail_tile() {
    let mcnk = RetailMcnk::new(0, 0).build();
    let data = FileBuilder::new()
        .chunk(b"MVER", &18u32.to_le_bytes())
        .chunk(b"MHDR", &[0u8; 64])
        .chunk(b"MCNK", &mcnk)
        .build();

    let mut sink = MemorySink::new();
    let summary = parse_bytes(&data, "Test_0_0.adt", &ParseOptions::default(), &mut sink)
        .expect("parse succeeds");

    assert_eq!(summary.format, Format::Retail);
    assert_eq!(summary.tiles_present, 1);
    assert_eq!(summary.mcnks, 1);
    assert_eq!(summary.failed_mcnks, 0);
    assert_eq!(summary.warnings, 0);

    assert_eq!(sink.tiles.len(), 1);
    assert_eq!((sink.tiles[0].2.x, sink.tiles[0].2.y), (0, 0));
    assert_eq!(sink.mcnks.len(), 1);
    let record = &sink.mcnks[0].2;
    assert_eq!((record.i, record.j), (0, 0));
    assert!(record.errors.is_empty());
    assert!(sink.heights.is_empty());
    assert!(sink.layers.is_empty());
    assert_eq!(sink.ended, vec![(sink.tiles[0].0, false)]);
}

#[test]
fn retail_tile_with_compressed_alpha_map() {
    // MCAL: 2 bytes of 0xFF, 4 raw bytes, 64 zeros, fill the rest
    let mut mcal = vec![0x82, 0xFF, 0x04, 0x01, 0x02, 0x03, 0x04, 0xC0, 0x00];
    let mut remaining = ALPHA_MAP_SIZE - 2 - 4 - 64;
    while remaining > 0 {
        let n = remaining.min(127);
        mcal.push(0x80 | n as u8);
        mcal.push(0x00);
        remaining -= n;
    }

    let mcnk = RetailMcnk::new(0, 0)
        .layers(&[(0, 0, 0, 0), (1, 0x300, 0, 0)])
        .alpha(&mcal)
        .build();
    let data = FileBuilder::new()
        .chunk(b"MVER", &18u32.to_le_bytes())
        .chunk(b"MTEX", b"a.blp\0b.blp\0")
        .chunk(b"MCNK", &mcnk)
        .build();

    let mut sink = MemorySink::new();
    let summary =
        parse_bytes(&data, "Test_0_0.adt", &ParseOptions::default(), &mut sink).expect("parse");
    assert_eq!(summary.warnings, 0);

    assert_eq!(sink.textures.len(), 2);
    assert_eq!(sink.layers.len(), 2);
    let (_, _, layer0) = &sink.layers[0];
    let (_, layer1_id, layer1) = &sink.layers[1];
    assert!(!layer0.alpha_map_present);
    assert!(layer1.alpha_map_present);
    assert!(layer1.compressed);
    assert_eq!(layer1.texture_name.as_deref(), Some("b.blp"));

    assert_eq!(sink.alpha_maps.len(), 1);
    let (map_layer, map) = &sink.alpha_maps[0];
    assert_eq!(map_layer, layer1_id);
    assert_eq!(map.len(), 4096);
    assert_eq!(&map[..6], &[0xFF, 0xFF, 0x01, 0x02, 0x03, 0x04]);
    assert!(map[6..70].iter().all(|&b| b == 0));
}

#[test]
fn alpha_world_with_embedded_tile() {
    let tile_blob = FileBuilder::new()
        .chunk(b"MCNK", &alpha_mcnk(0, 3, &{
            let mut h = zero_heights();
            h[0] = 1.5;
            h
        }, &[(0, 0)]))
        .chunk(b"MCNK", &alpha_mcnk(0, 3, &zero_heights(), &[]))
        .build();

    let mut world = FileBuilder::new();
    world
        .chunk(b"MVER", &17u32.to_le_bytes())
        .chunk(b"MPHD", &[0u8; 128]);

    // MAIN with cell (5, 7) pointing at the embedded blob
    let main_payload_offset = world.len() + 8;
    let blob_offset = main_payload_offset + 64 * 64 * 16;
    let mut main = vec![0u8; 64 * 64 * 16];
    let base = (7 * 64 + 5) * 16;
    main[base..base + 4].copy_from_slice(&(blob_offset as u32).to_le_bytes());
    main[base + 4..base + 8].copy_from_slice(&(tile_blob.len() as u32).to_le_bytes());
    world.chunk(b"MAIN", &main).raw(&tile_blob);
    let data = world.build();

    let mut sink = MemorySink::new();
    let summary =
        parse_bytes(&data, "World.wdt", &ParseOptions::default(), &mut sink).expect("parse");

    assert_eq!(summary.format, Format::Alpha);
    assert_eq!(summary.version, 17);
    assert_eq!(summary.tiles_present, 1);
    assert!(summary.presence.get(5, 7));
    assert_eq!(summary.mcnks, 2);
    assert_eq!(summary.failed_mcnks, 0);

    assert_eq!(sink.tiles.len(), 1);
    let tile = &sink.tiles[0].2;
    assert_eq!((tile.x, tile.y), (5, 7));
    assert_eq!(tile.offset as usize, blob_offset);

    let mcnks = sink.mcnks_of(sink.tiles[0].1);
    assert_eq!(mcnks.len(), 2);
    assert_eq!((mcnks[0].i, mcnks[0].j), (0, 0));
    assert_eq!((mcnks[1].i, mcnks[1].j), (1, 0));
    assert!(!mcnks[0].area_id_reliable);
    assert_eq!(mcnks[0].area_id, 3);
    assert_eq!(sink.heights.len(), 2);
    assert_eq!(sink.heights[0].1[0], 1.5);
}

#[test]
fn placements_resolve_through_the_index_table() {
    let mut mmid = Vec::new();
    mmid.extend_from_slice(&0u32.to_le_bytes());
    mmid.extend_from_slice(&8u32.to_le_bytes());
    let mut mddf = doodad_placement(0, 100, 1024);
    mddf.extend(doodad_placement(1, 200, 2048));

    let data = FileBuilder::new()
        .chunk(b"MVER", &18u32.to_le_bytes())
        .chunk(b"MMDX", b"tree.m2\0rock.m2\0")
        .chunk(b"MMID", &mmid)
        .chunk(b"MDDF", &mddf)
        .chunk(b"MCNK", &RetailMcnk::new(0, 0).build())
        .build();

    let mut sink = MemorySink::new();
    let summary =
        parse_bytes(&data, "Test_3_4.adt", &ParseOptions::default(), &mut sink).expect("parse");

    assert_eq!(summary.placements, 2);
    assert_eq!(summary.max_unique_id, Some(200));

    assert_eq!(sink.models.len(), 2);
    assert_eq!(sink.models[0].3, "tree.m2");

    assert_eq!(sink.placements.len(), 2);
    let first = &sink.placements[0].1;
    let second = &sink.placements[1].1;
    assert_eq!(first.name, "tree.m2");
    assert!(first.resolved);
    assert_eq!(first.scale, 1.0);
    assert_eq!(second.name, "rock.m2");
    assert_eq!(second.scale, 2.0);
    assert_eq!(second.unique_id, 200);
}

#[test]
fn unresolved_placement_keeps_sentinel_name() {
    let mut mmid = Vec::new();
    mmid.extend_from_slice(&0u32.to_le_bytes());
    let mddf = doodad_placement(9, 50, 1024);

    let data = FileBuilder::new()
        .chunk(b"MVER", &18u32.to_le_bytes())
        .chunk(b"MMDX", b"tree.m2\0")
        .chunk(b"MMID", &mmid)
        .chunk(b"MDDF", &mddf)
        .chunk(b"MCNK", &RetailMcnk::new(0, 0).build())
        .build();

    let mut sink = MemorySink::new();
    let summary =
        parse_bytes(&data, "Test_0_0.adt", &ParseOptions::default(), &mut sink).expect("parse");

    assert_eq!(summary.placements, 1);
    assert!(summary.warnings > 0);
    let placement = &sink.placements[0].1;
    assert!(!placement.resolved);
    assert_eq!(placement.name, "<invalid:9>");
    assert_eq!(summary.max_unique_id, Some(50));
}

#[test]
fn low_res_uncompressed_alpha_map_expands_nibbles() {
    let mcal = vec![0xF0u8; ALPHA_MAP_SIZE / 2];
    let mcnk = RetailMcnk::new(0, 0)
        .layers(&[(0, 0, 0, 0), (0, 0x100, 0, 0)])
        .alpha(&mcal)
        .build();
    let data = FileBuilder::new()
        .chunk(b"MVER", &18u32.to_le_bytes())
        .chunk(b"MCNK", &mcnk)
        .build();

    let mut sink = MemorySink::new();
    parse_bytes(&data, "Test_0_0.adt", &ParseOptions::default(), &mut sink).expect("parse");

    let (_, map) = &sink.alpha_maps[0];
    for i in (0..ALPHA_MAP_SIZE).step_by(2) {
        assert_eq!(map[i], 0x00);
        assert_eq!(map[i + 1], 0xFF);
    }
}

#[test]
fn do_not_fix_flag_replicates_last_row_and_column() {
    let mut pattern = vec![0u8; ALPHA_MAP_SIZE];
    for y in 0..MAP_RESOLUTION {
        for x in 0..MAP_RESOLUTION {
            pattern[y * MAP_RESOLUTION + x] = ((x + y * MAP_RESOLUTION) % 256) as u8;
        }
    }
    let mcal = rle_copy_encode(&pattern);
    let mcnk = RetailMcnk::new(0, 0)
        .flags(0x8000)
        .layers(&[(0, 0, 0, 0), (0, 0x300, 0, 0)])
        .alpha(&mcal)
        .build();
    let data = FileBuilder::new()
        .chunk(b"MVER", &18u32.to_le_bytes())
        .chunk(b"MCNK", &mcnk)
        .build();

    let mut sink = MemorySink::new();
    parse_bytes(&data, "Test_0_0.adt", &ParseOptions::default(), &mut sink).expect("parse");

    let (_, map) = &sink.alpha_maps[0];
    for y in 0..MAP_RESOLUTION {
        assert_eq!(map[y * MAP_RESOLUTION + 63], map[y * MAP_RESOLUTION + 62]);
    }
    for x in 0..MAP_RESOLUTION {
        assert_eq!(map[63 * MAP_RESOLUTION + x], map[62 * MAP_RESOLUTION + x]);
    }
    // interior untouched
    assert_eq!(map[0], 0);
    assert_eq!(map[62], 62);
}

#[test]
fn wmo_only_retail_world_emits_world_scope_placements() {
    let mut mwid = Vec::new();
    mwid.extend_from_slice(&0u32.to_le_bytes());
    let modf = object_placement(0, 777, 1024);

    let data = FileBuilder::new()
        .chunk(b"MVER", &18u32.to_le_bytes())
        .chunk(b"MPHD", &{
            let mut p = [0u8; 32];
            p[0] = 0x1; // WMO-only
            p
        })
        .chunk(b"MAIN", &[0u8; 64 * 64 * 8])
        .chunk(b"MWMO", b"wmo\\azeroth\\stormwind.wmo\0")
        .chunk(b"MWID", &mwid)
        .chunk(b"MODF", &modf)
        .build();

    let mut sink = MemorySink::new();
    let summary =
        parse_bytes(&data, "Stormwind.wdt", &ParseOptions::default(), &mut sink).expect("parse");

    assert_eq!(summary.tiles_present, 0);
    assert_eq!(summary.placements, 1);
    assert_eq!(summary.max_unique_id, Some(777));

    // the synthetic world-scope tile
    assert_eq!(sink.tiles.len(), 1);
    assert_eq!((sink.tiles[0].2.x, sink.tiles[0].2.y), (-1, -1));
    assert_eq!(sink.models.len(), 1);
    assert_eq!(sink.models[0].1, ModelKind::WorldObject);

    let placement = &sink.placements[0].1;
    assert_eq!(placement.kind, ModelKind::WorldObject);
    assert!(placement.extent.is_some());
    assert_eq!(placement.scale, 1.0);
}

#[test]
fn reversed_tag_files_parse_identically() {
    let mcnk = RetailMcnk::new(2, 3).build();
    let forward = FileBuilder::new()
        .chunk(b"MVER", &18u32.to_le_bytes())
        .chunk(b"MCNK", &mcnk)
        .build();
    let reversed = FileBuilder::reversed()
        .chunk(b"MVER", &18u32.to_le_bytes())
        .chunk(b"MCNK", &mcnk)
        .build();

    let mut sink_f = MemorySink::new();
    let mut sink_r = MemorySink::new();
    let summary_f =
        parse_bytes(&forward, "Test_0_0.adt", &ParseOptions::default(), &mut sink_f).expect("fwd");
    let summary_r =
        parse_bytes(&reversed, "Test_0_0.adt", &ParseOptions::default(), &mut sink_r)
            .expect("rev");

    assert_eq!(summary_f.warnings, 0);
    assert_eq!(summary_r.warnings, 0);
    assert_eq!(
        format!("{:?}", sink_f.mcnks),
        format!("{:?}", sink_r.mcnks)
    );
}

#[test]
fn parsing_is_deterministic() {
    let mcnk = RetailMcnk::new(0, 0)
        .heights(&{
            let mut h = zero_heights();
            h[7] = 42.0;
            h
        })
        .layers(&[(0, 0, 0, 0)])
        .build();
    let data = FileBuilder::new()
        .chunk(b"MVER", &18u32.to_le_bytes())
        .chunk(b"MTEX", b"a.blp\0")
        .chunk(b"MCNK", &mcnk)
        .build();

    let mut first = MemorySink::new();
    let mut second = MemorySink::new();
    parse_bytes(&data, "Test_0_0.adt", &ParseOptions::default(), &mut first).expect("first");
    parse_bytes(&data, "Test_0_0.adt", &ParseOptions::default(), &mut second).expect("second");

    assert_eq!(format!("{:?}", first.worlds), format!("{:?}", second.worlds));
    assert_eq!(format!("{:?}", first.mcnks), format!("{:?}", second.mcnks));
    assert_eq!(first.heights, second.heights);
    assert_eq!(
        format!("{:?}", first.layers),
        format!("{:?}", second.layers)
    );
}

#[test]
fn mcnks_emit_in_row_major_order_regardless_of_file_order() {
    let data = FileBuilder::new()
        .chunk(b"MVER", &18u32.to_le_bytes())
        .chunk(b"MCNK", &RetailMcnk::new(1, 1).build())
        .chunk(b"MCNK", &RetailMcnk::new(0, 0).build())
        .chunk(b"MCNK", &RetailMcnk::new(1, 0).build())
        .build();

    let mut sink = MemorySink::new();
    parse_bytes(&data, "Test_0_0.adt", &ParseOptions::default(), &mut sink).expect("parse");

    let coords: Vec<(u32, u32)> = sink.mcnks.iter().map(|(_, _, r)| (r.i, r.j)).collect();
    assert_eq!(coords, vec![(0, 0), (1, 0), (1, 1)]);
}

#[test]
fn duplicate_mcnk_coordinates_keep_the_first() {
    let first = RetailMcnk::new(0, 0)
        .heights(&{
            let mut h = zero_heights();
            h[0] = 1.0;
            h
        })
        .build();
    let second = RetailMcnk::new(0, 0)
        .heights(&{
            let mut h = zero_heights();
            h[0] = 2.0;
            h
        })
        .build();
    let data = FileBuilder::new()
        .chunk(b"MVER", &18u32.to_le_bytes())
        .chunk(b"MCNK", &first)
        .chunk(b"MCNK", &second)
        .build();

    let mut sink = MemorySink::new();
    let summary =
        parse_bytes(&data, "Test_0_0.adt", &ParseOptions::default(), &mut sink).expect("parse");

    assert_eq!(sink.mcnks.len(), 1);
    assert_eq!(sink.heights[0].1[0], 1.0);
    assert!(summary.warnings > 0);
}

#[test]
fn listfile_misses_reach_the_missing_stream() {
    let listfile = wow_terrain::listfile::build_listfile(["tileset/known.blp"]);
    let options = ParseOptions {
        listfile: Some(std::sync::Arc::new(listfile)),
        ..ParseOptions::default()
    };

    let data = FileBuilder::new()
        .chunk(b"MVER", &18u32.to_le_bytes())
        .chunk(b"MTEX", b"Tileset\\Known.blp\0Tileset\\Unknown.blp\0")
        .chunk(b"MCNK", &RetailMcnk::new(0, 0).build())
        .build();

    let mut sink = MemorySink::new();
    let summary = parse_bytes(&data, "Test_0_0.adt", &options, &mut sink).expect("parse");

    assert_eq!(summary.missing_assets, 1);
    assert_eq!(sink.missing_assets.len(), 1);
    assert_eq!(sink.missing_assets[0].0, "Tileset\\Unknown.blp");
}

#[test]
fn cancellation_ends_the_world_cleanly() {
    let flag = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(true));
    let options = ParseOptions {
        cancel: Some(flag),
        ..ParseOptions::default()
    };

    let data = FileBuilder::new()
        .chunk(b"MVER", &18u32.to_le_bytes())
        .chunk(b"MCNK", &RetailMcnk::new(0, 0).build())
        .build();

    let mut sink = MemorySink::new();
    let summary = parse_bytes(&data, "Test_0_0.adt", &options, &mut sink).expect("parse");

    assert!(summary.cancelled);
    assert_eq!(summary.mcnks, 0);
    assert_eq!(sink.ended.len(), 1);
    assert!(sink.ended[0].1, "end_world must carry cancelled=true");
}

#[test]
fn shadow_and_liquid_records_flow_through() {
    let mut mclq = Vec::new();
    mclq.extend_from_slice(&0u16.to_le_bytes());
    mclq.extend_from_slice(&1u16.to_le_bytes()); // one vertex
    mclq.extend_from_slice(&0u16.to_le_bytes());
    mclq.extend_from_slice(&0u16.to_le_bytes());
    for v in [1.0f32, 2.0, 3.0] {
        mclq.extend_from_slice(&v.to_le_bytes());
    }

    let mcnk = RetailMcnk::new(0, 0)
        .shadow(&[0xFFu8; 512])
        .legacy_liquid(&mclq)
        .build();
    let data = FileBuilder::new()
        .chunk(b"MVER", &18u32.to_le_bytes())
        .chunk(b"MCNK", &mcnk)
        .build();

    let mut sink = MemorySink::new();
    let summary =
        parse_bytes(&data, "Test_0_0.adt", &ParseOptions::default(), &mut sink).expect("parse");

    assert_eq!(summary.warnings, 0);
    assert_eq!(sink.shadow_maps.len(), 1);
    assert_eq!(sink.shadow_maps[0].1.len(), 512);
    assert_eq!(sink.liquids.len(), 1);
    match &sink.liquids[0].1 {
        wow_terrain::LiquidRecord::Legacy {
            n_vertices,
            heights,
            ..
        } => {
            assert_eq!(*n_vertices, 1);
            assert_eq!(heights, &vec![1.0, 2.0, 3.0]);
        }
        other => panic!("expected legacy liquid, got {other:?}"),
    }
}

#[test]
fn normals_arrive_as_unit_components() {
    let mut triples = [[0i8; 3]; 145];
    triples[0] = [127, -127, 0];
    let mcnk = RetailMcnk::new(0, 0).normals(&triples).build();
    let data = FileBuilder::new()
        .chunk(b"MVER", &18u32.to_le_bytes())
        .chunk(b"MCNK", &mcnk)
        .build();

    let mut sink = MemorySink::new();
    let summary =
        parse_bytes(&data, "Test_0_0.adt", &ParseOptions::default(), &mut sink).expect("parse");

    assert_eq!(summary.warnings, 0);
    assert_eq!(sink.normals.len(), 1);
    let normals = &sink.normals[0].1;
    assert_eq!(normals.len(), 145);
    assert_eq!(normals[0], [1.0, -1.0, 0.0]);
}

#[test]
fn vertex_colors_arrive_as_rgba() {
    let mut bgra = [[0u8; 4]; 145];
    bgra[0] = [0x10, 0x20, 0x30, 0x40];
    let mcnk = RetailMcnk::new(0, 0).vertex_colors(&bgra).build();
    let data = FileBuilder::new()
        .chunk(b"MVER", &18u32.to_le_bytes())
        .chunk(b"MCNK", &mcnk)
        .build();

    let mut sink = MemorySink::new();
    parse_bytes(&data, "Test_0_0.adt", &ParseOptions::default(), &mut sink).expect("parse");

    assert_eq!(sink.vertex_colors.len(), 1);
    assert_eq!(sink.vertex_colors[0].1[0], [0x30, 0x20, 0x10, 0x40]);
}

#[test]
fn emit_toggles_suppress_optional_records() {
    let mcnk = RetailMcnk::new(0, 0)
        .shadow(&[0u8; 512])
        .vertex_colors(&[[0u8; 4]; 145])
        .build();
    let data = FileBuilder::new()
        .chunk(b"MVER", &18u32.to_le_bytes())
        .chunk(b"MCNK", &mcnk)
        .build();

    let options = ParseOptions {
        emit_shadow_map: false,
        emit_vertex_colors: false,
        ..ParseOptions::default()
    };
    let mut sink = MemorySink::new();
    parse_bytes(&data, "Test_0_0.adt", &options, &mut sink).expect("parse");

    assert!(sink.shadow_maps.is_empty());
    assert!(sink.vertex_colors.is_empty());
}
