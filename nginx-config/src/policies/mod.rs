//! Policy generators turn the policies attached to a server or path into
//! include files.

pub mod clientsettings;
pub mod observability;
pub mod upstreamsettings;

use crate::errors::Result;
use crate::http::{Location, Server};
use dataplane::policies::Policy;

/// Content of an include file, named relative to the includes folder.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PolicyFile {
    pub name: String,
    pub content: Vec<u8>,
}

/// Every method defaults to generating nothing, so a generator only
/// implements the blocks its policy applies to.
pub trait PolicyGenerator {
    /// Configuration for a `server` block.
    fn generate_for_server(
        &self,
        _policies: &[Policy],
        _server: &Server,
    ) -> Result<Vec<PolicyFile>> {
        Ok(Vec::new())
    }

    /// Configuration for an external or redirect location.
    fn generate_for_location(
        &self,
        _policies: &[Policy],
        _location: &Location,
    ) -> Result<Vec<PolicyFile>> {
        Ok(Vec::new())
    }

    /// Configuration for an internal location.
    fn generate_for_internal_location(&self, _policies: &[Policy]) -> Result<Vec<PolicyFile>> {
        Ok(Vec::new())
    }
}

/// Runs every generator and concatenates their files.
pub struct CompositeGenerator {
    generators: Vec<Box<dyn PolicyGenerator>>,
}

impl CompositeGenerator {
    pub fn new(generators: Vec<Box<dyn PolicyGenerator>>) -> Self {
        CompositeGenerator { generators }
    }
}

impl PolicyGenerator for CompositeGenerator {
    fn generate_for_server(&self, policies: &[Policy], server: &Server) -> Result<Vec<PolicyFile>> {
        let mut files = Vec::new();
        for generator in &self.generators {
            files.extend(generator.generate_for_server(policies, server)?);
        }
        Ok(files)
    }

    fn generate_for_location(
        &self,
        policies: &[Policy],
        location: &Location,
    ) -> Result<Vec<PolicyFile>> {
        let mut files = Vec::new();
        for generator in &self.generators {
            files.extend(generator.generate_for_location(policies, location)?);
        }
        Ok(files)
    }

    fn generate_for_internal_location(&self, policies: &[Policy]) -> Result<Vec<PolicyFile>> {
        let mut files = Vec::new();
        for generator in &self.generators {
            files.extend(generator.generate_for_internal_location(policies)?);
        }
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(&'static str);

    impl PolicyGenerator for Fixed {
        fn generate_for_server(&self, _: &[Policy], _: &Server) -> Result<Vec<PolicyFile>> {
            Ok(vec![PolicyFile {
                name: self.0.to_string(),
                content: Vec::new(),
            }])
        }
    }

    struct Nothing;

    impl PolicyGenerator for Nothing {}

    #[test]
    fn test_composite_concatenates_in_order() {
        let composite = CompositeGenerator::new(vec![
            Box::new(Fixed("first")),
            Box::new(Nothing),
            Box::new(Fixed("second")),
        ]);

        let files = composite.generate_for_server(&[], &Server::default()).unwrap();
        let names: Vec<_> = files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["first", "second"]);

        assert!(
            composite
                .generate_for_location(&[], &Location::default())
                .unwrap()
                .is_empty()
        );
        assert!(composite.generate_for_internal_location(&[]).unwrap().is_empty());
    }
}
