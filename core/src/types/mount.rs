//! Compose-style volume mount strings: `source:dest[:mode]`.

/// A parsed volume mount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeMount<'a> {
    pub source: &'a str,
    pub dest: &'a str,
    pub read_only: bool,
}

impl<'a> VolumeMount<'a> {
    /// Parse a mount string. The error is a human-readable reason.
    pub fn parse(spec: &'a str) -> Result<Self, String> {
        let parts: Vec<&str> = spec.split(':').collect();
        let (source, dest, mode) = match parts.as_slice() {
            [source, dest] => (*source, *dest, None),
            [source, dest, mode] => (*source, *dest, Some(*mode)),
            _ => return Err("expected source:dest[:mode]".into()),
        };
        if source.is_empty() {
            return Err("empty source".into());
        }
        if !dest.starts_with('/') {
            return Err(format!("destination '{}' is not an absolute path", dest));
        }
        let read_only = match mode {
            None | Some("rw") => false,
            Some("ro") => true,
            Some(other) => return Err(format!("unknown mode '{}'", other)),
        };
        Ok(VolumeMount {
            source,
            dest,
            read_only,
        })
    }

    /// Absolute sources are host bind mounts.
    pub fn is_bind(&self) -> bool {
        self.source.starts_with('/')
    }

    /// The app volume this mount refers to, if it is a named mount.
    pub fn volume_name(&self) -> Option<&'a str> {
        if self.is_bind() {
            None
        } else {
            Some(self.source)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_mount() {
        let m = VolumeMount::parse("data:/var/lib/data").unwrap();
        assert_eq!(m.volume_name(), Some("data"));
        assert!(!m.read_only);
    }

    #[test]
    fn bind_mount_read_only() {
        let m = VolumeMount::parse("/etc/hosts:/etc/hosts:ro").unwrap();
        assert!(m.is_bind());
        assert!(m.read_only);
        assert_eq!(m.volume_name(), None);
    }

    #[test]
    fn rejects_relative_destination() {
        assert!(VolumeMount::parse("data:var").is_err());
    }

    #[test]
    fn rejects_unknown_mode_and_shape() {
        assert!(VolumeMount::parse("data:/x:rx").is_err());
        assert!(VolumeMount::parse("data").is_err());
        assert!(VolumeMount::parse(":/x").is_err());
    }
}
