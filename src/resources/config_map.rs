//! Configuration ConfigMap for ParadeDB pods

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::ConfigMap;

use crate::controller::error::Result;
use crate::crd::ParadeDB;
use crate::postgres::config::{
    INIT_SQL, PG_HBA_CONF, POSTGRESQL_CONF, QUERIES_YAML, build_custom_queries, build_init_script,
    build_pg_hba_config, build_postgres_config,
};
use crate::resources::common::{object_meta, spec_hash, standard_labels};

/// Render the data of the `<name>-config` ConfigMap
pub fn config_data(db: &ParadeDB) -> Result<BTreeMap<String, String>> {
    let mut data = BTreeMap::from([
        (POSTGRESQL_CONF.to_string(), build_postgres_config(db)),
        (PG_HBA_CONF.to_string(), build_pg_hba_config(db)),
        (INIT_SQL.to_string(), build_init_script(db)),
    ]);
    if let Some(queries) = build_custom_queries(db)? {
        data.insert(QUERIES_YAML.to_string(), queries);
    }
    Ok(data)
}

/// Hash of the rendered configuration, stamped on the pod template so that
/// configuration changes roll the pods
pub fn config_hash(db: &ParadeDB) -> Result<String> {
    Ok(spec_hash(&config_data(db)?))
}

/// Generate the `<name>-config` ConfigMap
pub fn generate_config_map(db: &ParadeDB) -> Result<ConfigMap> {
    Ok(ConfigMap {
        metadata: object_meta(db, db.config_map_name(), standard_labels(db)),
        data: Some(config_data(db)?),
        ..Default::default()
    })
}
