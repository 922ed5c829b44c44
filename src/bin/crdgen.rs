//! CRD YAML Generator
//!
//! This binary generates Kubernetes CRD manifests for all custom resources
//! known to the xstore-backup-operator.
//!
//! Usage: cargo run --bin crdgen > deploy/crds/all.yaml

use xstore_backup_operator::crd::generate_crds;

fn main() -> anyhow::Result<()> {
    for crd in generate_crds()? {
        println!("---");
        print!("{}", crd);
    }
    Ok(())
}
