//! Geocoding result shapes.

use super::sample::Coordinates;

/// A human-readable place description for a coordinate.
///
/// Every component is optional; services fill in what they know.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Placemark {
    /// Point-of-interest or place name.
    pub name: Option<String>,
    /// Street address (street and number).
    pub thoroughfare: Option<String>,
    /// City or town.
    pub locality: Option<String>,
    /// State or province.
    pub administrative_area: Option<String>,
    /// Postal code.
    pub postal_code: Option<String>,
    /// Country name.
    pub country: Option<String>,
    /// ISO 3166-1 alpha-2 country code.
    pub iso_country_code: Option<String>,
    /// Representative coordinate for the place.
    pub coordinates: Option<Coordinates>,
}

impl Placemark {
    /// Single-line postal address built from the available components.
    ///
    /// Components are joined with ", " in postal order, postal code and
    /// locality sharing one segment. Returns an empty string if nothing is
    /// known.
    pub fn formatted_address(&self) -> String {
        let city = match (&self.postal_code, &self.locality) {
            (Some(code), Some(city)) => Some(format!("{} {}", code, city)),
            (Some(code), None) => Some(code.clone()),
            (None, Some(city)) => Some(city.clone()),
            (None, None) => None,
        };

        [
            self.thoroughfare.clone(),
            city,
            self.administrative_area.clone(),
            self.country.clone(),
        ]
        .into_iter()
        .flatten()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
    }
}

/// Coordinates resolved from an address string.
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodedLocation {
    /// Resolved position.
    pub coordinates: Coordinates,
    /// Extent of the matched place in metres, if the service reports one.
    pub radius: Option<f64>,
    /// The place that matched, if the service reports one.
    pub placemark: Option<Placemark>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hamburg_town_hall() -> Placemark {
        Placemark {
            name: Some("Rathaus".into()),
            thoroughfare: Some("Rathausmarkt 1".into()),
            locality: Some("Hamburg".into()),
            administrative_area: Some("Hamburg".into()),
            postal_code: Some("20095".into()),
            country: Some("Germany".into()),
            iso_country_code: Some("DE".into()),
            coordinates: Some(Coordinates::new(53.5503, 9.9921)),
        }
    }

    #[test]
    fn test_formatted_address_full() {
        assert_eq!(
            hamburg_town_hall().formatted_address(),
            "Rathausmarkt 1, 20095 Hamburg, Hamburg, Germany"
        );
    }

    #[test]
    fn test_formatted_address_partial() {
        let placemark = Placemark {
            locality: Some("Reykjavik".into()),
            country: Some("Iceland".into()),
            ..Default::default()
        };
        assert_eq!(placemark.formatted_address(), "Reykjavik, Iceland");
    }

    #[test]
    fn test_formatted_address_empty() {
        assert_eq!(Placemark::default().formatted_address(), "");
    }
}
