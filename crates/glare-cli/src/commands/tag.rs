use super::{make_controller, print_artifact, resolve_artifact_id, ArtifactRef, Connection, EXIT_SUCCESS};

pub fn add(conn: &Connection, artifact: &ArtifactRef, tag: &str, json: bool) -> Result<u8, String> {
    let ctl = make_controller(conn, Some(&artifact.type_name))?;
    let id = resolve_artifact_id(&ctl, artifact)?;
    let updated = ctl.add_tag(&id, tag, None).map_err(|e| e.to_string())?;
    print_artifact(&updated, json)?;
    Ok(EXIT_SUCCESS)
}

pub fn remove(conn: &Connection, artifact: &ArtifactRef, tag: &str, json: bool) -> Result<u8, String> {
    let ctl = make_controller(conn, Some(&artifact.type_name))?;
    let id = resolve_artifact_id(&ctl, artifact)?;
    let updated = ctl.remove_tag(&id, tag, None).map_err(|e| e.to_string())?;
    print_artifact(&updated, json)?;
    Ok(EXIT_SUCCESS)
}
