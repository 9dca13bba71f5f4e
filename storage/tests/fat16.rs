use std::io::Cursor;

use storage::{
    DeviceError,
    fat::{
        Batch, Cluster, FatError, FormatOptions, SECTOR_SIZE, VolumeGeometry,
        dir::list_root_dir,
        dirent::DIR_ENTRY_SIZE,
        fat::{FatEntry, count_free_clusters, read_entry},
        find_free_cluster_run, find_free_root_entry_run, format_volume, inject_file,
        read_geometry,
    },
};

/// A freshly formatted in-memory volume.
fn formatted(sectors: usize) -> Cursor<Vec<u8>> {
    let mut device = Cursor::new(vec![0u8; sectors * SECTOR_SIZE]);
    format_volume(&mut device, &FormatOptions::default().with_volume_id(0xF00D)).unwrap();
    device
}

fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 % 256) as u8).collect()
}

fn slice_at(device: &Cursor<Vec<u8>>, offset: u64, len: usize) -> &[u8] {
    let start = usize::try_from(offset).unwrap();
    &device.get_ref()[start..start + len]
}

#[test]
fn format_then_read_geometry() {
    let mut device = formatted(20_000);
    let (bpb, geometry) = read_geometry(&mut device).unwrap();

    assert_eq!(bpb.sectors_per_cluster(), 2);
    assert_eq!(bpb.root_entries(), 128);
    assert_eq!(bpb.total_sectors(), 20_000);
    assert_eq!(geometry.cluster_count(), 9976);
    assert_eq!(geometry.warning(), None);
    assert!(geometry.fat_offset() < geometry.root_dir_offset());
    assert!(geometry.root_dir_offset() < geometry.data_offset());

    assert_eq!(
        slice_at(&device, geometry.fat_offset(), 4),
        &[0xF8, 0xFF, 0xFF, 0xFF]
    );
}

#[test]
fn fresh_volume_has_everything_free() {
    let mut device = formatted(40_000);
    let (bpb, geometry) = read_geometry(&mut device).unwrap();

    assert_eq!(
        find_free_cluster_run(&mut device, &geometry, 1).unwrap(),
        Cluster::FIRST
    );
    assert_eq!(
        find_free_root_entry_run(&mut device, &bpb, &geometry, 1).unwrap(),
        0
    );
    assert_eq!(
        find_free_root_entry_run(&mut device, &bpb, &geometry, bpb.root_entries()).unwrap(),
        0
    );
    assert!(list_root_dir(&mut device, &geometry).unwrap().is_empty());
    assert_eq!(
        count_free_clusters(&mut device, &geometry).unwrap(),
        geometry.cluster_count()
    );
}

#[test]
fn one_cluster_file() {
    let mut device = formatted(20_000);
    let (bpb, geometry) = read_geometry(&mut device).unwrap();
    let data = payload(1024);
    assert_eq!(geometry.bytes_per_cluster(), 1024);

    let injected = inject_file(
        &mut device,
        &bpb,
        &geometry,
        &mut data.as_slice(),
        1024,
        "kernel.elf",
        0,
    )
    .unwrap();

    assert_eq!(injected.clusters(), 1);
    assert_eq!(
        read_entry(&mut device, &geometry, injected.first_cluster()).unwrap(),
        FatEntry::EndOfChain
    );
    assert_eq!(
        slice_at(&device, geometry.fat_entry_offset(injected.first_cluster()), 2),
        &[0xFF, 0xFF]
    );
    assert_eq!(
        read_entry(&mut device, &geometry, Cluster::new(3)).unwrap(),
        FatEntry::Free
    );

    let entries = list_root_dir(&mut device, &geometry).unwrap();
    assert_eq!(entries.len(), 1);
    let (index, entry) = entries[0];
    assert_eq!(index, 0);
    assert_eq!(entry.name(), b"KERNEL  ELF");
    assert_eq!(entry.size(), 1024);
    assert_eq!(entry.first_cluster(), Cluster::FIRST);
}

#[test]
fn partial_cluster_keeps_exact_size() {
    let mut device = formatted(20_000);
    let (bpb, geometry) = read_geometry(&mut device).unwrap();
    let data = payload(1500);

    let injected =
        inject_file(&mut device, &bpb, &geometry, &mut data.as_slice(), 1500, "a.b", 5).unwrap();

    assert_eq!(injected.clusters(), 2);
    // Slot 0 is still unused, so listing stops right away.
    assert!(list_root_dir(&mut device, &geometry).unwrap().is_empty());

    let raw = slice_at(&device, geometry.root_entry_offset(5), DIR_ENTRY_SIZE);
    assert_eq!(&raw[..11], b"A       B  ");
    assert_eq!(&raw[28..32], &1500u32.to_le_bytes());
}

#[test]
fn payload_round_trip() {
    let mut device = formatted(40_000);
    let (bpb, geometry) = read_geometry(&mut device).unwrap();
    let data = payload(3 * 2048 + 17);

    let injected = inject_file(
        &mut device,
        &bpb,
        &geometry,
        &mut data.as_slice(),
        data.len() as u64,
        "initrd.img",
        0,
    )
    .unwrap();

    assert_eq!(injected.clusters(), 4);
    assert_eq!(
        count_free_clusters(&mut device, &geometry).unwrap(),
        geometry.cluster_count() - 4
    );
    let mut chain = vec![injected.first_cluster()];
    while let FatEntry::Next(next) =
        read_entry(&mut device, &geometry, *chain.last().unwrap()).unwrap()
    {
        chain.push(next);
    }
    assert_eq!(
        chain,
        [2, 3, 4, 5].map(Cluster::new).to_vec(),
        "contiguous chain ending in EOC"
    );

    let start = geometry.cluster_offset(injected.first_cluster());
    assert_eq!(slice_at(&device, start, data.len()), data.as_slice());
}

#[test]
fn batch_fills_consecutive_slots() {
    let mut device = formatted(20_000);
    let (_, geometry) = read_geometry(&mut device).unwrap();

    // An existing entry followed by a deleted one.
    let root = usize::try_from(geometry.root_dir_offset()).unwrap();
    device.get_mut()[root..root + 11].copy_from_slice(b"EXISTINGBIN");
    device.get_mut()[root + DIR_ENTRY_SIZE] = 0xE5;

    let names = ["one.txt", "two.txt", "three.txt"];
    let mut batch = Batch::reserve(&mut device, 3).unwrap();
    for (i, name) in names.iter().enumerate() {
        let data = payload(100 * (i + 1));
        let injected = batch
            .inject(&mut data.as_slice(), data.len() as u64, name)
            .unwrap();
        assert_eq!(usize::from(injected.entry_index()), i + 1);
    }
    assert_eq!(batch.remaining(), 0);
    batch.finish().unwrap();

    let entries = list_root_dir(&mut device, &geometry).unwrap();
    let listed: Vec<(u16, String, u32)> = entries
        .iter()
        .map(|(index, entry)| (*index, entry.file_name(), entry.size()))
        .collect();
    assert_eq!(
        listed,
        vec![
            (0, "EXISTING.BIN".to_owned(), 0),
            (1, "ONE.TXT".to_owned(), 100),
            (2, "TWO.TXT".to_owned(), 200),
            (3, "THREE.TXT".to_owned(), 300),
        ]
    );
    // Each file got its own cluster.
    let clusters: Vec<u16> = entries[1..]
        .iter()
        .map(|(_, entry)| entry.first_cluster().value())
        .collect();
    assert_eq!(clusters, [2, 3, 4]);
}

#[test]
fn first_fit_reuses_holes() {
    let mut device = formatted(20_000);
    let (bpb, geometry) = read_geometry(&mut device).unwrap();
    let one_cluster = payload(1000);

    for (index, name) in ["a", "b", "c"].into_iter().enumerate() {
        inject_file(
            &mut device,
            &bpb,
            &geometry,
            &mut one_cluster.as_slice(),
            1000,
            name,
            u16::try_from(index).unwrap(),
        )
        .unwrap();
    }

    // Free the chain of "b" (cluster 3).
    let offset = usize::try_from(geometry.fat_entry_offset(Cluster::new(3))).unwrap();
    device.get_mut()[offset..offset + 2].fill(0);

    assert_eq!(
        find_free_cluster_run(&mut device, &geometry, 2).unwrap(),
        Cluster::new(5)
    );
    assert_eq!(
        find_free_cluster_run(&mut device, &geometry, 1).unwrap(),
        Cluster::new(3)
    );
}

#[test]
fn full_fat_is_reported() {
    let mut device = formatted(20_000);
    let (bpb, geometry) = read_geometry(&mut device).unwrap();

    let start = usize::try_from(geometry.fat_offset()).unwrap();
    let len = usize::try_from(geometry.fat_size()).unwrap();
    for entry in device.get_mut()[start..start + len].chunks_exact_mut(2) {
        entry.copy_from_slice(&0xFFF7u16.to_le_bytes());
    }

    assert!(matches!(
        find_free_cluster_run(&mut device, &geometry, 1),
        Err(FatError::InsufficientClusterSpace { requested: 1 })
    ));
    let data = payload(10);
    assert!(matches!(
        inject_file(&mut device, &bpb, &geometry, &mut data.as_slice(), 10, "x", 0),
        Err(FatError::InsufficientClusterSpace { .. })
    ));
    // Nothing was written to the root directory.
    assert_eq!(slice_at(&device, geometry.root_dir_offset(), 1), &[0]);
}

#[test]
fn full_root_directory_is_reported() {
    let mut device = formatted(20_000);

    assert!(matches!(
        Batch::reserve(&mut device, 129),
        Err(FatError::InsufficientDirectorySpace { requested: 129 })
    ));
    assert!(Batch::reserve(&mut device, 128).is_ok());
}

#[test]
fn secondary_fat_is_left_alone() {
    let mut device = formatted(20_000);
    // Declare a second FAT: the root directory region now doubles as FAT #2.
    device.get_mut()[0x10] = 2;

    let (bpb, geometry) = read_geometry(&mut device).unwrap();
    let warning = geometry.warning().unwrap();
    assert_eq!(warning.fat_count, 2);
    assert_eq!(
        warning.to_string(),
        "Unsupported number of FATs (2 != 1): only the first FAT is updated"
    );

    let second_fat = geometry.fat_offset() + geometry.fat_size();
    let before = slice_at(&device, second_fat, 64).to_vec();

    let data = payload(5000);
    inject_file(&mut device, &bpb, &geometry, &mut data.as_slice(), 5000, "f.bin", 0).unwrap();

    assert_ne!(slice_at(&device, geometry.fat_entry_offset(Cluster::FIRST), 2), &[0, 0]);
    assert_eq!(slice_at(&device, second_fat, 64), before.as_slice());
}

#[test]
fn blank_image_is_rejected() {
    let mut device = Cursor::new(vec![0u8; 20_000 * SECTOR_SIZE]);
    assert!(matches!(
        read_geometry(&mut device),
        Err(FatError::UnsupportedFilesystem(_))
    ));
    assert!(matches!(
        Batch::reserve(&mut device, 1),
        Err(FatError::UnsupportedFilesystem(_))
    ));
}

#[test]
fn device_errors_are_propagated() {
    let mut backing = vec![0u8; 4 * SECTOR_SIZE];
    let mut device = Cursor::new(backing.as_mut_slice());

    let err = format_volume(
        &mut device,
        &FormatOptions::default().with_total_sectors(20_000),
    )
    .unwrap_err();
    assert!(matches!(err, FatError::Device(DeviceError::Write { .. })));

    let mut empty = Cursor::new(Vec::new());
    assert!(matches!(
        read_geometry(&mut empty),
        Err(FatError::Device(DeviceError::Read { .. }))
    ));
}

#[test]
fn geometry_matches_bpb_on_disk() {
    let mut device = formatted(100_000);
    let (bpb, geometry) = read_geometry(&mut device).unwrap();

    assert_eq!(VolumeGeometry::from_bpb(&bpb).unwrap(), geometry);
    assert_eq!(bpb.sectors_per_cluster(), 4);
    assert_eq!(bpb.root_entries(), 256);
    assert!(geometry.summary(&bpb).to_string().contains("100000 sectors total"));
}
