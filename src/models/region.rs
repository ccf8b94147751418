use serde::Serialize;

use travelog_api_structs::Coordinates;

/// Coarse country bucket for a coordinate.
///
/// The boxes overlap, so they are checked most specific first and the first match wins.
/// Anything outside every box ends up in [`Region::Elsewhere`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Region {
    Switzerland,
    Italy,
    France,
    Elsewhere,
}

struct Bounds {
    latitude: (f64, f64),
    longitude: (f64, f64),
}

impl Bounds {
    fn contains(&self, coords: Coordinates) -> bool {
        let (lat, lng) = (coords.latitude(), coords.longitude());
        lat > self.latitude.0
            && lat < self.latitude.1
            && lng > self.longitude.0
            && lng < self.longitude.1
    }
}

const REGIONS: &[(Region, Bounds)] = &[
    (
        Region::Switzerland,
        Bounds {
            latitude: (45.8, 47.9),
            longitude: (5.9, 10.5),
        },
    ),
    (
        Region::Italy,
        Bounds {
            latitude: (36.0, 47.1),
            longitude: (6.6, 18.6),
        },
    ),
    (
        Region::France,
        Bounds {
            latitude: (42.3, 51.1),
            longitude: (-5.2, 8.3),
        },
    ),
];

impl Region {
    pub fn locate(coords: Coordinates) -> Region {
        REGIONS
            .iter()
            .find(|(_, bounds)| bounds.contains(coords))
            .map(|(region, _)| *region)
            .unwrap_or(Region::Elsewhere)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Region::Switzerland => "Switzerland",
            Region::Italy => "Italy",
            Region::France => "France",
            Region::Elsewhere => "Elsewhere",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locate_seed_cities() {
        assert_eq!(Region::locate(Coordinates(41.9028, 12.4964)), Region::Italy);
        assert_eq!(Region::locate(Coordinates(43.7696, 11.2558)), Region::Italy);
        assert_eq!(Region::locate(Coordinates(46.948, 7.4474)), Region::Switzerland);
        assert_eq!(Region::locate(Coordinates(45.764, 4.8357)), Region::France);
    }

    #[test]
    fn test_locate_outside_every_box() {
        assert_eq!(Region::locate(Coordinates(52.52, 13.405)), Region::Elsewhere);
        assert_eq!(Region::locate(Coordinates(0.0, 0.0)), Region::Elsewhere);
    }

    #[test]
    fn test_boxes_are_exclusive_at_edges() {
        assert_eq!(Region::locate(Coordinates(36.0, 12.0)), Region::Elsewhere);
    }
}
