use kube::CustomResourceExt;
use paradedb_operator::crd::ParadeDB;

fn main() -> Result<(), serde_yaml::Error> {
    print!("{}", serde_yaml::to_string(&ParadeDB::crd())?);
    Ok(())
}
