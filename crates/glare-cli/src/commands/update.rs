use super::{
    make_controller, parse_properties, print_artifact, resolve_artifact_id, ArtifactRef,
    Connection, EXIT_SUCCESS,
};

pub struct UpdateArgs<'a> {
    pub properties: &'a [String],
    pub lists: &'a [String],
    pub dicts: &'a [String],
    pub remove: &'a [String],
}

pub fn run(
    conn: &Connection,
    artifact: &ArtifactRef,
    args: &UpdateArgs<'_>,
    json: bool,
) -> Result<u8, String> {
    let updates = parse_properties(args.properties, args.lists, args.dicts)?;
    let ctl = make_controller(conn, Some(&artifact.type_name))?;
    let id = resolve_artifact_id(&ctl, artifact)?;
    let updated = ctl
        .update(&id, args.remove, &updates, None)
        .map_err(|e| e.to_string())?;
    print_artifact(&updated, json)?;
    Ok(EXIT_SUCCESS)
}
