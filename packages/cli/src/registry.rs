//! Deployers built into the binary.

use site_deploy::registry::DeployerRegistry;

/// Returns a registry holding every built-in deployer.
#[must_use]
pub fn builtin() -> DeployerRegistry {
    let mut registry = DeployerRegistry::new();
    registry.register(&site_deploy_s3::DEFINITION, site_deploy_s3::S3Deployer::factory);
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_s3_deployer() {
        let registry = builtin();
        let definition = registry.definition("awss3").expect("awss3 registered");
        assert_eq!(definition.name, "AWS S3");
    }
}
