use playtree::{Cursor, EntryFlags, EntryId, PlayTree, Step};

#[derive(Debug, Default)]
struct CliArgs {
    shuffle: Option<bool>,
    loop_count: Option<i32>,
    seed: Option<u64>,
    limit: Option<usize>,
    nodes: bool,
    params: Vec<(String, String)>,
    items: Vec<String>,
}

const DEFAULT_LIMIT: usize = 1000;

fn main() -> anyhow::Result<()> {
    playtree::logging::init();
    let args = parse_args(std::env::args().skip(1).collect())?;
    let mut settings = playtree::config::load_settings()?;
    if let Some(shuffle) = args.shuffle {
        settings.shuffle = shuffle;
    }
    if let Some(loop_count) = args.loop_count {
        settings.loop_count = loop_count;
    }
    if args.seed.is_some() {
        settings.seed = args.seed;
    }
    settings.stop_on_nodes |= args.nodes;

    let mut tree = PlayTree::new();
    let root = build_tree(&mut tree, &args.items)?;
    tree.set_loop(root, settings.loop_count);
    if settings.shuffle {
        tree.insert_flags(root, EntryFlags::RANDOM);
    }
    for (name, value) in &args.params {
        tree.set_param(root, name.as_str(), value.as_str())?;
    }

    let mut options = settings.option_stack();
    let mut cursor = Cursor::open(&mut tree, root, &mut options, settings.rng())?;
    let limit = args.limit.unwrap_or(DEFAULT_LIMIT);
    let mut printed = 0;
    while printed < limit {
        let depth = cursor.loop_stack().len().saturating_sub(1);
        if let Some(file) = cursor.file(&tree, 1) {
            println!("{}{file}", "  ".repeat(depth));
            printed += 1;
            continue;
        }
        match cursor.step(&mut tree, 1, settings.stop_on_nodes)? {
            Step::Entry => {}
            Step::Node => {
                let depth = cursor.loop_stack().len().saturating_sub(1);
                if let Some(group) = cursor.current() {
                    println!("{}[{group}]", "  ".repeat(depth));
                }
                if cursor.step(&mut tree, 0, false)? == Step::End {
                    break;
                }
            }
            Step::End => break,
        }
    }
    Ok(())
}

/// Builds a tree from file names, with `[` and `]` opening and closing
/// nested groups.
fn build_tree(tree: &mut PlayTree, items: &[String]) -> anyhow::Result<EntryId> {
    let root = tree.create();
    let mut levels: Vec<(EntryId, Option<EntryId>)> = vec![(root, None)];

    for item in items {
        match item.as_str() {
            "[" => {
                let group = tree.create();
                attach(tree, &mut levels, group)?;
                levels.push((group, None));
            }
            "]" => {
                if levels.len() == 1 {
                    anyhow::bail!("unbalanced ']'");
                }
                levels.pop();
            }
            file => {
                let Some((_, last)) = levels.last().copied() else {
                    anyhow::bail!("no open group");
                };
                let leaf = tree.add_file_entry(last, file)?;
                if last.is_none() {
                    attach(tree, &mut levels, leaf)?;
                } else if let Some(level) = levels.last_mut() {
                    level.1 = Some(leaf);
                }
            }
        }
    }

    if levels.len() != 1 {
        anyhow::bail!("unbalanced '['");
    }
    Ok(root)
}

fn attach(
    tree: &mut PlayTree,
    levels: &mut [(EntryId, Option<EntryId>)],
    entry: EntryId,
) -> anyhow::Result<()> {
    let Some((container, last)) = levels.last_mut() else {
        anyhow::bail!("no open group");
    };
    match *last {
        Some(previous) => tree.append(previous, entry),
        None => tree.set_child(*container, entry)?,
    }
    *last = Some(entry);
    Ok(())
}

fn parse_args(args: Vec<String>) -> anyhow::Result<CliArgs> {
    let mut out = CliArgs::default();
    let mut index = 0;
    while index < args.len() {
        match args[index].as_str() {
            "--shuffle" => out.shuffle = Some(true),
            "--no-shuffle" => out.shuffle = Some(false),
            "--nodes" => out.nodes = true,
            "--loop" | "--seed" | "--limit" | "--set" => {
                let flag = args[index].clone();
                index += 1;
                let Some(value) = args.get(index).map(|value| value.trim()) else {
                    anyhow::bail!("{flag} requires a value");
                };
                match flag.as_str() {
                    "--loop" => out.loop_count = Some(value.parse()?),
                    "--seed" => out.seed = Some(value.parse()?),
                    "--limit" => out.limit = Some(value.parse()?),
                    _ => {
                        let Some((name, param)) = value.split_once('=') else {
                            anyhow::bail!("--set expects name=value");
                        };
                        out.params.push((name.to_string(), param.to_string()));
                    }
                }
            }
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            other if other.starts_with("--") => anyhow::bail!("unknown argument {other}"),
            item => out.items.push(item.to_string()),
        }
        index += 1;
    }
    if out.items.is_empty() {
        anyhow::bail!("no files given");
    }
    Ok(out)
}

fn print_help() {
    println!("playtree [options] FILE... ([ FILE... ])");
    println!("  --shuffle / --no-shuffle   Shuffle the top level");
    println!("  --loop N                   Extra passes (-1 loops forever)");
    println!("  --seed N                   Seed for shuffling");
    println!("  --nodes                    Print a marker when entering a group");
    println!("  --limit N                  Stop after N files (default {DEFAULT_LIMIT})");
    println!("  --set name=value           Option applied while the playlist plays");
}
