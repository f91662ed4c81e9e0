// test of VFAT long names, both standalone and as stored in a directory
use fat12kit::fs::vfat;
use fat12kit::fs::fat::{Disk,RawSlot};
use fat12kit::img::Preset;

#[test]
fn exact_multiple_has_no_terminator() {
    let name = "Thirteen_char";
    assert_eq!(name.len(),13);
    let recs = vfat::encode_long_name(name,b"THIRTE~1   ").expect("encode failed");
    assert_eq!(recs.len(),1);
    assert!(!recs[0].units().contains(&0));
    assert!(!recs[0].units().contains(&0xffff));
    assert_eq!(vfat::decode_long_name(&recs,b"THIRTE~1   ").expect("decode failed"),name);
    let name = "Fourteen_chars";
    let recs = vfat::encode_long_name(name,b"FOURTE~1   ").expect("encode failed");
    assert_eq!(recs.len(),2);
    assert_eq!(recs[0].ord,0x42);
    assert_eq!(recs[1].ord,0x01);
    let tail = recs[0].units();
    assert_eq!(tail[0],'s' as u16);
    assert_eq!(tail[1],0);
    assert!(tail[2..].iter().all(|u| *u==0xffff));
}

#[test]
fn unicode_and_limits() {
    let short = *b"CAF_~1  TXT";
    let name = "Café Ünïcödé ✓.txt";
    let recs = vfat::encode_long_name(name,&short).expect("encode failed");
    assert_eq!(vfat::decode_long_name(&recs,&short).expect("decode failed"),name);
    let longest: String = std::iter::repeat('x').take(vfat::MAX_LONG_NAME).collect();
    assert_eq!(vfat::entries_needed(&longest),20);
    assert!(vfat::encode_long_name(&longest,&short).is_ok());
    let too_long = longest + "x";
    assert_eq!(vfat::encode_long_name(&too_long,&short),Err(vfat::Error::InvalidLongName));
    assert_eq!(vfat::encode_long_name("a:b",&short),Err(vfat::Error::InvalidLongName));
    assert_eq!(vfat::encode_long_name(" . ",&short),Err(vfat::Error::InvalidLongName));
}

#[test]
fn wrong_short_name() {
    let recs = vfat::encode_long_name("Some Long Name.doc",b"SOMELO~1DOC").expect("encode failed");
    assert_eq!(vfat::decode_long_name(&recs,b"SOMELO~2DOC"),Err(vfat::Error::ChecksumMismatch));
    assert_eq!(vfat::decode_long_name(&recs[1..],b"SOMELO~1DOC"),Err(vfat::Error::MalformedSequence));
    assert_eq!(vfat::decode_long_name(&[],b"SOMELO~1DOC"),Err(vfat::Error::MalformedSequence));
}

#[test]
fn records_on_disk() {
    let mut disk = Disk::create(Preset::D35_1440).expect("create failed");
    disk.add_file("/My_Favorite_Song.mid",&[0x4d,0x54,0x68,0x64],None).expect("add failed");
    let g = disk.geometry();
    let bytes = disk.to_bytes();
    let root = &bytes[g.root_dir_offset()..];
    // last record first, flagged 0x40, long name attribute, zero cluster
    assert_eq!(root[0],0x42);
    assert_eq!(root[11],0x0f);
    assert_eq!(root[13],0x54);
    assert_eq!(root[26..28],[0,0]);
    assert_eq!(root[32],0x01);
    assert_eq!(root[32+13],0x54);
    assert_eq!(&root[64..75],b"MY_FAV~1MID");
    assert_eq!(root[64+11],0x20);
    assert_eq!(root[96],0);
    match &disk.raw_directory("/").expect("raw failed")[0..3] {
        [RawSlot::LongName { seq: 2, last: true, checksum: 0x54, text }, RawSlot::LongName { seq: 1, last: false, .. }, RawSlot::Short { name, size: 4, .. }] => {
            assert_eq!(text,"ong.mid");
            assert_eq!(name,"MY_FAV~1.MID");
        },
        other => panic!("unexpected slots {:?}",other)
    }
}

#[test]
fn damaged_records_fall_back_to_short_name() {
    let mut disk = Disk::create(Preset::D35_720).expect("create failed");
    disk.add_file("/A Rather Long Name.txt",b"data",None).expect("add failed");
    let g = disk.geometry();
    let mut bytes = disk.to_bytes();
    // spoil the checksum in the second record
    bytes[g.root_dir_offset() + 32 + 13] ^= 0xff;
    let disk = Disk::from_bytes(&bytes).expect("open failed");
    let listing = disk.list("/").expect("list failed");
    assert_eq!(listing.len(),1);
    assert!(listing[0].long_name.is_none());
    assert_eq!(listing[0].name,"ARATHE~1.TXT");
    assert_eq!(disk.extract("/ARATHE~1.TXT").expect("extract failed"),b"data");
    // orphaned records are ignored
    let mut bytes = disk.to_bytes();
    bytes[g.root_dir_offset() + 64] = 0xe5;
    let disk = Disk::from_bytes(&bytes).expect("open failed");
    assert!(disk.list("/").expect("list failed").is_empty());
}
