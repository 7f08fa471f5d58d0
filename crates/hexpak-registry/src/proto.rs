//! Wire messages for the signed registry index.

/// Envelope around every signed index payload.
#[derive(Clone, PartialEq, prost::Message)]
pub struct Signed {
    /// Serialized resource message.
    #[prost(bytes = "vec", tag = "1")]
    pub payload: Vec<u8>,

    /// RSA PKCS#1 v1.5 / SHA-512 signature over `payload`.
    #[prost(bytes = "vec", tag = "2")]
    pub signature: Vec<u8>,
}

/// The `/names` resource.
#[derive(Clone, PartialEq, prost::Message)]
pub struct Names {
    #[prost(message, repeated, tag = "1")]
    pub packages: Vec<NamePackage>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct NamePackage {
    #[prost(string, tag = "1")]
    pub name: String,
}

/// The `/versions` resource.
#[derive(Clone, PartialEq, prost::Message)]
pub struct Versions {
    #[prost(message, repeated, tag = "1")]
    pub packages: Vec<PackageVersions>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct PackageVersions {
    #[prost(string, tag = "1")]
    pub name: String,

    /// All published versions, oldest first.
    #[prost(string, repeated, tag = "2")]
    pub versions: Vec<String>,

    /// Versions that have been retired.
    #[prost(string, repeated, tag = "3")]
    pub retired: Vec<String>,
}

/// The `/packages/{name}` resource.
#[derive(Clone, PartialEq, prost::Message)]
pub struct Package {
    #[prost(message, repeated, tag = "1")]
    pub releases: Vec<Release>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Release {
    #[prost(string, tag = "1")]
    pub version: String,

    /// Outer checksum of the release tarball.
    #[prost(bytes = "vec", tag = "2")]
    pub checksum: Vec<u8>,

    #[prost(message, repeated, tag = "3")]
    pub dependencies: Vec<Dependency>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Dependency {
    #[prost(string, tag = "1")]
    pub package: String,

    /// Version requirement, e.g. `~> 1.0`.
    #[prost(string, tag = "2")]
    pub requirement: String,

    #[prost(bool, optional, tag = "3")]
    pub optional: Option<bool>,

    /// Application name when it differs from the package name.
    #[prost(string, optional, tag = "4")]
    pub app: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message;

    #[test]
    fn signed_roundtrip() {
        let signed = Signed {
            payload: vec![1, 2, 3],
            signature: vec![4, 5, 6],
        };
        let encoded = signed.encode_to_vec();
        assert_eq!(Signed::decode(encoded.as_slice()).unwrap(), signed);
    }

    #[test]
    fn package_roundtrip() {
        let package = Package {
            releases: vec![Release {
                version: "1.0.0".to_string(),
                checksum: vec![0xab; 32],
                dependencies: vec![Dependency {
                    package: "decimal".to_string(),
                    requirement: "~> 2.0".to_string(),
                    optional: Some(true),
                    app: None,
                }],
            }],
        };
        let encoded = package.encode_to_vec();
        assert_eq!(Package::decode(encoded.as_slice()).unwrap(), package);
    }

    #[test]
    fn unknown_fields_are_tolerated() {
        // A payload from a newer server revision may carry extra fields.
        let mut encoded = Names {
            packages: vec![NamePackage {
                name: "ecto".to_string(),
            }],
        }
        .encode_to_vec();
        // field 15, wire type 2, three bytes
        encoded.extend_from_slice(&[0x7a, 0x03, b'x', b'y', b'z']);

        let decoded = Names::decode(encoded.as_slice()).unwrap();
        assert_eq!(decoded.packages[0].name, "ecto");
    }
}
