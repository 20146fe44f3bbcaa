
use log::error;
use std::str::FromStr;

use crate::data_types::parameters::FrequencySource;
use crate::data_types::pedigree::SuperPopulation;

/// Maps a super-population to the INFO field name its allele frequencies live under for a
/// given source. The three supported schemas encode the same concept under different
/// names, so everything downstream goes through this lookup and stays schema-agnostic.
/// # Arguments
/// * `source` - the frequency database schema
/// * `super_population` - the canonical super-population code
pub fn resolve_frequency_field(source: FrequencySource, super_population: SuperPopulation) -> &'static str {
    match source {
        FrequencySource::Gnomad2_1 => match super_population {
            SuperPopulation::African => "AF_afr",
            SuperPopulation::Admixed => "AF_amr",
            SuperPopulation::EastAsian => "AF_eas",
            SuperPopulation::European => "AF_nfe",
            SuperPopulation::SouthAsian => "AF_sas",
            SuperPopulation::All => "AF"
        },
        FrequencySource::Gnomad3_1 => match super_population {
            SuperPopulation::African => "AF-afr",
            SuperPopulation::Admixed => "AF-amr",
            SuperPopulation::EastAsian => "AF-eas",
            SuperPopulation::European => "AF-nfe",
            SuperPopulation::SouthAsian => "AF-sas",
            SuperPopulation::All => "AF"
        },
        FrequencySource::Genomes1000 => match super_population {
            SuperPopulation::African => "AFR_AF",
            SuperPopulation::Admixed => "AMR_AF",
            SuperPopulation::EastAsian => "EAS_AF",
            SuperPopulation::European => "EUR_AF",
            SuperPopulation::SouthAsian => "SAS_AF",
            SuperPopulation::All => "AF"
        }
    }
}

/// String-code variant of the resolver for callers holding raw configuration text. An
/// unknown code logs an error and falls back to the pooled ALL mapping, keeping the
/// analysis alive rather than failing the unit.
/// # Arguments
/// * `source` - the frequency database schema
/// * `code` - the raw super-population code, e.g. "AFR"
pub fn resolve_frequency_field_str(source: FrequencySource, code: &str) -> &'static str {
    match SuperPopulation::from_str(code) {
        Ok(super_population) => resolve_frequency_field(source, super_population),
        Err(_) => {
            error!("Unknown super-population code {code:?}, falling back to the {} mapping", SuperPopulation::All);
            resolve_frequency_field(source, SuperPopulation::All)
        }
    }
}

/// The full set of field names the given source can serve, useful when pre-loading every
/// frequency annotation from a reference file in one pass.
pub fn all_frequency_fields(source: FrequencySource) -> Vec<&'static str> {
    let mut fields: Vec<&'static str> = SuperPopulation::ANCESTRY_CODES.iter()
        .map(|&sp| resolve_frequency_field(source, sp))
        .collect();
    fields.push(resolve_frequency_field(source, SuperPopulation::All));
    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_mappings() {
        assert_eq!(resolve_frequency_field(FrequencySource::Gnomad2_1, SuperPopulation::African), "AF_afr");
        assert_eq!(resolve_frequency_field(FrequencySource::Gnomad3_1, SuperPopulation::African), "AF-afr");
        assert_eq!(resolve_frequency_field(FrequencySource::Genomes1000, SuperPopulation::African), "AFR_AF");

        assert_eq!(resolve_frequency_field(FrequencySource::Gnomad2_1, SuperPopulation::All), "AF");
        assert_eq!(resolve_frequency_field(FrequencySource::Genomes1000, SuperPopulation::European), "EUR_AF");
    }

    #[test]
    fn test_string_codes() {
        assert_eq!(resolve_frequency_field_str(FrequencySource::Genomes1000, "EAS"), "EAS_AF");
        // unknown codes fall back to the pooled mapping
        assert_eq!(resolve_frequency_field_str(FrequencySource::Genomes1000, "MARTIAN"), "AF");
    }

    #[test]
    fn test_all_fields() {
        let fields = all_frequency_fields(FrequencySource::Gnomad2_1);
        assert_eq!(fields.len(), 6);
        assert!(fields.contains(&"AF_nfe"));
        assert!(fields.contains(&"AF"));
    }
}
