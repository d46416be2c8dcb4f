use playtree::{Cursor, EntryFlags, EntryId, OptionStack, PlayTree, Step};
use rand::SeedableRng;
use rand::rngs::SmallRng;

fn album(tree: &mut PlayTree, files: &[&str]) -> EntryId {
    let album = tree.create();
    let mut last = None;
    for file in files {
        let leaf = tree.add_file_entry(last, *file).expect("add file");
        if last.is_none() {
            tree.set_child(album, leaf).expect("set child");
        }
        last = Some(leaf);
    }
    album
}

fn play_all(tree: &mut PlayTree, cursor: &mut Cursor<&mut OptionStack>) -> Vec<String> {
    let mut played = Vec::new();
    while let Some(file) = cursor.next_file(tree, 1).expect("next file") {
        played.push(file);
    }
    played
}

#[test]
fn nested_albums_play_in_order_with_their_options() {
    let mut tree = PlayTree::new();
    let first = album(&mut tree, &["a1.ogg", "a2.ogg"]);
    let second = album(&mut tree, &["b1.ogg"]);
    tree.set_param(second, "volume", "30").expect("set");
    tree.append(first, second);
    let root = tree.create();
    tree.set_child(root, first).expect("set child");
    let mut options = OptionStack::new();

    let mut cursor = Cursor::open(&mut tree, root, &mut options, SmallRng::seed_from_u64(1))
        .expect("open");
    assert_eq!(cursor.scope().expect("scope").get("volume"), None);
    let played = play_all(&mut tree, &mut cursor);
    drop(cursor);

    assert_eq!(played, vec!["a1.ogg", "a2.ogg", "b1.ogg"]);
    assert_eq!(options.depth(), 0);
}

#[test]
fn shuffled_album_is_a_permutation_and_respects_loop() {
    let mut tree = PlayTree::new();
    let files = ["1.ogg", "2.ogg", "3.ogg", "4.ogg", "5.ogg", "6.ogg"];
    let root = album(&mut tree, &files);
    tree.insert_flags(root, EntryFlags::RANDOM);
    tree.set_loop(root, 1);
    let mut options = OptionStack::new();

    let mut cursor = Cursor::open(&mut tree, root, &mut options, SmallRng::seed_from_u64(9))
        .expect("open");
    let played = play_all(&mut tree, &mut cursor);

    assert_eq!(played.len(), files.len() * 2);
    let mut pass: Vec<&str> = played[..files.len()].iter().map(String::as_str).collect();
    pass.sort_unstable();
    assert_eq!(pass, files);
    assert_eq!(played[..files.len()], played[files.len()..]);
    tree.check_links(root).expect("links");
}

#[test]
fn cleanup_then_walk_skips_dead_branches() {
    let mut tree = PlayTree::new();
    let good = album(&mut tree, &["keep.ogg"]);
    let empty = tree.create();
    let dead = tree.create();
    tree.add_file(dead, "gone.ogg").expect("add file");
    tree.remove_file(dead, "gone.ogg").expect("remove file");
    tree.append(empty, dead);
    tree.append(empty, good);
    let root = tree.create();
    tree.set_child(root, empty).expect("set child");
    let mut options = OptionStack::new();

    let mut cursor = Cursor::open(&mut tree, root, &mut options, SmallRng::seed_from_u64(3))
        .expect("open");

    assert_eq!(tree.children(root).collect::<Vec<_>>(), vec![good]);
    assert_eq!(play_all(&mut tree, &mut cursor), vec!["keep.ogg"]);
}

#[test]
fn unplayable_tree_cannot_be_opened() {
    let mut tree = PlayTree::new();
    let root = tree.create();
    let mut options = OptionStack::new();

    let result = Cursor::open(&mut tree, root, &mut options, SmallRng::seed_from_u64(0));

    assert!(result.is_err());
    assert!(tree.is_empty());
}

#[test]
fn step_past_end_stays_at_end() {
    let mut tree = PlayTree::new();
    let root = album(&mut tree, &["only.ogg"]);
    let mut options = OptionStack::new();
    let mut cursor = Cursor::open(&mut tree, root, &mut options, SmallRng::seed_from_u64(0))
        .expect("open");

    assert_eq!(cursor.step(&mut tree, 1, false).expect("step"), Step::End);
    assert_eq!(cursor.step(&mut tree, 1, false).expect("step"), Step::End);
    assert!(cursor.loop_stack().is_empty());
}
