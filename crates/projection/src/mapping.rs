//! Parameters shared by every projection and the `Mapping` group factory.

use crate::cylindrical::{Equirectangular, SimpleCylindrical};
use crate::lambert::LambertConformal;
use crate::MapProjection;
use cube_common::{CubeError, Result};
use label::{Container, Traverse};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LongitudeDomain {
    /// [0, 360)
    Zero360,
    /// [-180, 180)
    Neg180,
}

impl LongitudeDomain {
    pub fn normalize(&self, lon: f64) -> f64 {
        match self {
            Self::Zero360 => lon.rem_euclid(360.0),
            Self::Neg180 => (lon + 180.0).rem_euclid(360.0) - 180.0,
        }
    }
}

/// Inclusive latitude/longitude box in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroundRange {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MappingParameters {
    /// Sphere radius in metres.
    pub radius: f64,
    pub center_latitude: f64,
    pub center_longitude: f64,
    pub domain: LongitudeDomain,
    pub range: Option<GroundRange>,
}

impl MappingParameters {
    pub fn new(radius: f64) -> Self {
        Self {
            radius,
            center_latitude: 0.0,
            center_longitude: 0.0,
            domain: LongitudeDomain::Zero360,
            range: None,
        }
    }

    pub fn with_center(mut self, lat: f64, lon: f64) -> Self {
        self.center_latitude = lat;
        self.center_longitude = lon;
        self
    }

    pub fn with_range(mut self, range: GroundRange) -> Self {
        self.range = Some(range);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.radius.is_finite() && self.radius > 0.0) {
            return Err(CubeError::user(format!("EquatorialRadius {} must be positive", self.radius)));
        }
        if let Some(r) = &self.range {
            if r.min_lat > r.max_lat || r.min_lon > r.max_lon {
                return Err(CubeError::user("mapping ground range has minimum above maximum"));
            }
            if r.min_lat < -90.0 || r.max_lat > 90.0 {
                return Err(CubeError::user("mapping latitudes must lie in [-90, 90]"));
            }
        }
        Ok(())
    }

    /// Read the common keywords of a `Mapping` group.
    pub fn from_group(group: &Container) -> Result<Self> {
        let number = |name: &str| -> Result<f64> { group.keyword(name, Traverse::CurrentLevel)?.as_f64(0) };
        let optional = |name: &str| -> Result<Option<f64>> {
            match group.keyword(name, Traverse::CurrentLevel) {
                Ok(k) => k.as_f64(0).map(Some),
                Err(_) => Ok(None),
            }
        };

        let mut params = Self::new(number("EquatorialRadius")?);
        params.center_latitude = optional("CenterLatitude")?.unwrap_or(0.0);
        params.center_longitude = optional("CenterLongitude")?.unwrap_or(0.0);
        params.domain = match group.keyword_value("LongitudeDomain", Traverse::CurrentLevel) {
            Ok("180") => LongitudeDomain::Neg180,
            Ok("360") | Err(_) => LongitudeDomain::Zero360,
            Ok(other) => return Err(CubeError::user(format!("invalid LongitudeDomain '{other}'"))),
        };
        let range = [
            optional("MinimumLatitude")?,
            optional("MaximumLatitude")?,
            optional("MinimumLongitude")?,
            optional("MaximumLongitude")?,
        ];
        if let [Some(min_lat), Some(max_lat), Some(min_lon), Some(max_lon)] = range {
            params.range = Some(GroundRange {
                min_lat,
                max_lat,
                min_lon,
                max_lon,
            });
        }
        params.validate()?;
        Ok(params)
    }
}

/// Build the projection named by `ProjectionName` in a `Mapping` group.
pub fn from_mapping_group(group: &Container) -> Result<Box<dyn MapProjection>> {
    let name = group.keyword_value("ProjectionName", Traverse::CurrentLevel)?;
    let params = MappingParameters::from_group(group)?;
    debug!(projection = name, radius = params.radius, "Configuring projection");
    match name.to_ascii_lowercase().as_str() {
        "simplecylindrical" => Ok(Box::new(SimpleCylindrical::new(params))),
        "equirectangular" => Ok(Box::new(Equirectangular::new(params)?)),
        "lambertconformal" => {
            let p1 = group.keyword("FirstStandardParallel", Traverse::CurrentLevel)?.as_f64(0)?;
            let p2 = group.keyword("SecondStandardParallel", Traverse::CurrentLevel)?.as_f64(0)?;
            Ok(Box::new(LambertConformal::new(params, p1, p2)?))
        }
        _ => Err(CubeError::user(format!("unsupported projection '{name}'"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use label::Keyword;

    fn mapping(name: &str) -> Container {
        let mut g = Container::new("Mapping");
        g.add_keyword(Keyword::new("ProjectionName", name));
        g.add_keyword(Keyword::with_unit("EquatorialRadius", "3396190.0", "meters"));
        g.add_keyword(Keyword::new("CenterLongitude", "180.0"));
        g.add_keyword(Keyword::new("LongitudeDomain", "360"));
        g.add_keyword(Keyword::new("MinimumLatitude", "-10"));
        g.add_keyword(Keyword::new("MaximumLatitude", "10"));
        g.add_keyword(Keyword::new("MinimumLongitude", "170"));
        g.add_keyword(Keyword::new("MaximumLongitude", "190"));
        g
    }

    #[test]
    fn test_factory() {
        let proj = from_mapping_group(&mapping("SimpleCylindrical")).unwrap();
        assert_eq!(proj.name(), "SimpleCylindrical");
        let range = proj.ground_range().unwrap();
        assert_eq!((range.min_lon, range.max_lon), (170.0, 190.0));

        let err = from_mapping_group(&mapping("Sinusoidal")).unwrap_err();
        assert_eq!(err.kind(), cube_common::ErrorKind::User);

        let mut no_radius = Container::new("Mapping");
        no_radius.add_keyword(Keyword::new("ProjectionName", "SimpleCylindrical"));
        assert_eq!(
            from_mapping_group(&no_radius).unwrap_err().kind(),
            cube_common::ErrorKind::NotFound
        );
    }

    #[test]
    fn test_longitude_domains() {
        assert_eq!(LongitudeDomain::Zero360.normalize(-90.0), 270.0);
        assert_eq!(LongitudeDomain::Neg180.normalize(270.0), -90.0);
        assert_eq!(LongitudeDomain::Neg180.normalize(180.0), -180.0);
    }
}
