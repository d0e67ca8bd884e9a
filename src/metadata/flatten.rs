//! Flattening rules for nested catalog records.

use crate::catalog::{Building, PlutoRecord};
use crate::metadata::FlatMetadata;

/// Flatten building records to `building_{i}_{field}` keys plus a `building_names`
/// aggregate used for filter queries. Scalars are stringified; absent and empty
/// fields are dropped.
pub fn flatten_buildings(buildings: &[Building]) -> FlatMetadata {
    let mut metadata = FlatMetadata::new();
    let mut names = Vec::new();

    for (i, building) in buildings.iter().enumerate() {
        metadata.insert_opt(format!("building_{i}_bbl"), building.bbl.clone());
        metadata.insert_opt(format!("building_{i}_bin"), building.bin.clone());
        metadata.insert_opt(format!("building_{i}_block"), building.block.clone());
        metadata.insert_opt(format!("building_{i}_lot"), building.lot.clone());
        metadata.insert_opt(format!("building_{i}_address"), building.address.clone());
        metadata.insert_opt(format!("building_{i}_name"), building.name.clone());
        if let Some(lat) = building.lat {
            metadata.insert(format!("building_{i}_lat"), lat.to_string());
        }
        if let Some(lon) = building.lon {
            metadata.insert(format!("building_{i}_lon"), lon.to_string());
        }

        let display = building
            .name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .or(building.address.as_deref())
            .unwrap_or("")
            .trim();
        if !display.is_empty() {
            names.push(display.to_string());
        }
    }

    metadata.insert("building_names", names);
    metadata
}

/// Copy PLUTO scalar fields under a `pluto_` prefix.
pub fn flatten_pluto(record: &PlutoRecord) -> FlatMetadata {
    let mut metadata = FlatMetadata::new();
    metadata.insert_opt("pluto_year_built", record.year_built.clone());
    metadata.insert_opt("pluto_land_use", record.land_use.clone());
    metadata.insert_opt("pluto_historic_district", record.historic_district.clone());
    metadata.insert_opt("pluto_zoning", record.zoning.clone());
    metadata.insert_opt("pluto_lot_area", record.lot_area.clone());
    metadata
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::MetadataValue;

    #[test]
    fn buildings_flatten_with_indexed_keys() {
        let buildings = vec![
            Building {
                bbl: Some("3085770001".into()),
                address: Some("5816 Clarendon Road".into()),
                name: Some("Wyckoff House".into()),
                lat: Some(40.6442),
                ..Default::default()
            },
            Building {
                address: Some("5820 Clarendon Road".into()),
                ..Default::default()
            },
        ];

        let metadata = flatten_buildings(&buildings);
        assert_eq!(
            metadata.get("building_0_bbl").and_then(MetadataValue::as_text),
            Some("3085770001")
        );
        assert_eq!(
            metadata.get("building_0_lat").and_then(MetadataValue::as_text),
            Some("40.6442")
        );
        assert_eq!(
            metadata.get("building_1_address").and_then(MetadataValue::as_text),
            Some("5820 Clarendon Road")
        );
        assert_eq!(
            metadata.get("building_names"),
            Some(&MetadataValue::TextList(vec![
                "Wyckoff House".into(),
                "5820 Clarendon Road".into()
            ]))
        );
    }

    #[test]
    fn empty_building_list_has_no_names_key() {
        let metadata = flatten_buildings(&[]);
        assert!(metadata.is_empty());
    }

    #[test]
    fn pluto_fields_are_prefixed() {
        let record = PlutoRecord {
            year_built: Some("1652".into()),
            land_use: Some("Residential".into()),
            zoning: Some("R3-2".into()),
            ..Default::default()
        };

        let metadata = flatten_pluto(&record);
        assert_eq!(
            metadata.get("pluto_year_built").and_then(MetadataValue::as_text),
            Some("1652")
        );
        assert_eq!(
            metadata.get("pluto_zoning").and_then(MetadataValue::as_text),
            Some("R3-2")
        );
        assert!(!metadata.contains_key("pluto_historic_district"));
    }
}
