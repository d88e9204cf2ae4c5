use super::{make_controller, print_artifact, resolve_artifact_id, ArtifactRef, Connection, EXIT_SUCCESS};

pub fn run(conn: &Connection, artifact: &ArtifactRef, json: bool) -> Result<u8, String> {
    let ctl = make_controller(conn, Some(&artifact.type_name))?;
    let id = resolve_artifact_id(&ctl, artifact)?;
    let found = ctl.get(&id, None).map_err(|e| e.to_string())?;
    print_artifact(&found, json)?;
    Ok(EXIT_SUCCESS)
}
