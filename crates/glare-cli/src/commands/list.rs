use super::{colorize_status, json_pretty, make_controller, Connection, EXIT_SUCCESS};
use glare_client::types::attr_str;
use glare_client::{Artifact, ListOptions};

pub struct ListArgs<'a> {
    pub filters: &'a [String],
    pub sort: Option<&'a str>,
    /// Zero lists everything.
    pub limit: usize,
    pub page_size: Option<usize>,
    pub marker: Option<&'a str>,
}

pub fn run(
    conn: &Connection,
    type_name: &str,
    args: &ListArgs<'_>,
    json: bool,
) -> Result<u8, String> {
    let ctl = make_controller(conn, Some(type_name))?;

    let mut options = ListOptions::default();
    for filter in args.filters {
        let (key, value) = filter
            .split_once('=')
            .ok_or_else(|| format!("bad request: --filter expects KEY=VALUE, got '{filter}'"))?;
        options = options.filter(key, value);
    }
    if let Some(sort) = args.sort {
        options = options.sort(sort);
    }
    if args.limit > 0 {
        options = options.limit(args.limit);
    }
    if let Some(size) = args.page_size {
        options = options.page_size(size);
    }
    if let Some(marker) = args.marker {
        options = options.marker(marker);
    }

    let artifacts: Vec<Artifact> = ctl
        .list(&options, None)
        .map_err(|e| e.to_string())?
        .collect::<Result<_, _>>()
        .map_err(|e| e.to_string())?;

    if json {
        println!("{}", json_pretty(&artifacts)?);
    } else if artifacts.is_empty() {
        println!("no artifacts found");
    } else {
        let all = type_name == "all";
        if all {
            print!("{:<18} ", "TYPE");
        }
        println!(
            "{:<36} {:<20} {:<10} {:<12} {:<11} STATUS",
            "ID", "NAME", "VERSION", "OWNER", "VISIBILITY"
        );
        for art in &artifacts {
            if all {
                print!("{:<18} ", attr_str(art, "type_name"));
            }
            println!(
                "{:<36} {:<20} {:<10} {:<12} {:<11} {}",
                attr_str(art, "id"),
                attr_str(art, "name"),
                attr_str(art, "version"),
                attr_str(art, "owner"),
                attr_str(art, "visibility"),
                colorize_status(attr_str(art, "status")),
            );
        }
    }
    Ok(EXIT_SUCCESS)
}
