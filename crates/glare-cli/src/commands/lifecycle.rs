use super::{make_controller, print_artifact, resolve_artifact_id, ArtifactRef, Connection, EXIT_SUCCESS};

#[derive(Debug, Clone, Copy)]
pub enum Transition {
    Activate,
    Deactivate,
    Reactivate,
    Publish,
}

pub fn run(
    conn: &Connection,
    artifact: &ArtifactRef,
    transition: Transition,
    json: bool,
) -> Result<u8, String> {
    let ctl = make_controller(conn, Some(&artifact.type_name))?;
    let id = resolve_artifact_id(&ctl, artifact)?;
    let result = match transition {
        Transition::Activate => ctl.activate(&id, None),
        Transition::Deactivate => ctl.deactivate(&id, None),
        Transition::Reactivate => ctl.reactivate(&id, None),
        Transition::Publish => ctl.publish(&id, None),
    };
    let updated = result.map_err(|e| e.to_string())?;
    print_artifact(&updated, json)?;
    Ok(EXIT_SUCCESS)
}
