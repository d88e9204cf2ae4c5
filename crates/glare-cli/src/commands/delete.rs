use super::{json_pretty, make_controller, resolve_artifact_id, ArtifactRef, Connection, EXIT_SUCCESS};

pub fn run(conn: &Connection, artifact: &ArtifactRef, json: bool) -> Result<u8, String> {
    let ctl = make_controller(conn, Some(&artifact.type_name))?;
    let id = resolve_artifact_id(&ctl, artifact)?;
    ctl.delete(&id, None).map_err(|e| e.to_string())?;
    if json {
        let payload = serde_json::json!({ "id": id, "deleted": true });
        println!("{}", json_pretty(&payload)?);
    } else {
        println!("deleted {} artifact {id}", artifact.type_name);
    }
    Ok(EXIT_SUCCESS)
}
