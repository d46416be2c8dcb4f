#![no_main]

use libfuzzer_sys::fuzz_target;
use playtree::{Cursor, EntryFlags, EntryId, OptionStack, PlayTree};
use rand::SeedableRng;
use rand::rngs::SmallRng;

fuzz_target!(|data: &[u8]| {
    let mut tree = PlayTree::new();
    let root = tree.create();
    let mut entries: Vec<EntryId> = Vec::new();
    let mut last = None;
    for idx in 0..(data.len() % 12).max(1) {
        let Ok(leaf) = tree.add_file_entry(last, format!("track_{idx}.ogg")) else {
            return;
        };
        if last.is_none() {
            let _ = tree.set_child(root, leaf);
        }
        entries.push(leaf);
        last = Some(leaf);
    }

    let mut bytes = data.iter().copied();
    while let (Some(op), Some(arg)) = (bytes.next(), bytes.next()) {
        let pick = entries[arg as usize % entries.len()];
        if !tree.contains(pick) {
            continue;
        }
        match op % 6 {
            0 => {
                let group = tree.create();
                if let Ok(leaf) = tree.add_file_entry(None, format!("group_{arg}.ogg")) {
                    let _ = tree.set_child(group, leaf);
                    entries.push(leaf);
                }
                tree.append(pick, group);
                entries.push(group);
            }
            1 => tree.insert_flags(pick, EntryFlags::RANDOM),
            2 => tree.set_loop(pick, i32::from(arg % 3) - 1),
            3 => {
                let _ = tree.set_param(pick, "volume", arg.to_string());
            }
            4 => {
                let _ = tree.remove_file(pick, "track_0.ogg");
            }
            _ => tree.insert_flags(pick, EntryFlags::RANDOM_PLAYED),
        }
    }
    if let Err(err) = tree.check_links(root) {
        panic!("{err:#}");
    }

    let mut options = OptionStack::new();
    let Ok(mut cursor) = Cursor::open(&mut tree, root, &mut options, SmallRng::seed_from_u64(0))
    else {
        return;
    };
    for _ in 0..64 {
        match cursor.next_file(&mut tree, 1) {
            Ok(Some(_)) => {}
            _ => break,
        }
    }
    drop(cursor);
    assert_eq!(options.depth(), 0);
});
