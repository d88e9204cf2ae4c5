use super::{make_controller, parse_properties, print_artifact, Connection, EXIT_SUCCESS};

pub struct CreateArgs<'a> {
    pub name: &'a str,
    pub version: &'a str,
    pub properties: &'a [String],
    pub lists: &'a [String],
    pub dicts: &'a [String],
}

pub fn run(conn: &Connection, type_name: &str, args: &CreateArgs<'_>, json: bool) -> Result<u8, String> {
    let attrs = parse_properties(args.properties, args.lists, args.dicts)?;
    let ctl = make_controller(conn, Some(type_name))?;
    let created = ctl
        .create(args.name, Some(args.version), attrs, None)
        .map_err(|e| e.to_string())?;
    print_artifact(&created, json)?;
    Ok(EXIT_SUCCESS)
}
