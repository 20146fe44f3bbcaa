
use rustc_hash::FxHashMap;

#[derive(thiserror::Error, Debug)]
pub enum PopulationError {
    #[error("variant must have at least one allele")]
    NoAlleles,
    #[error("allele{index} is empty (length = 0)")]
    EmptyAllele { index: usize },
    #[error("diploid genotype must have 1 or 2 called alleles, got {count}")]
    InvalidAlleleCount { count: usize },
    #[error("variant at position {position} is not after the previous variant at {previous}")]
    UnsortedVariant { position: u64, previous: u64 },
    #[error("genome {identifier:?} already has a contig named {contig:?}")]
    DuplicateContig { identifier: String, contig: String },
    #[error("population {name:?} must hold exactly one genome, found {count}")]
    NotSingleGenome { name: String, count: usize },
    #[error("genome {identifier:?} must hold exactly one contig, found {count}")]
    NotSingleContig { identifier: String, count: usize }
}

/// A sample's called alleles at one locus. Diploid data, so 1 or 2 calls; anything
/// beyond that is rejected at construction and treated as a data error upstream.
#[derive(Clone, Debug, PartialEq)]
pub struct DiploidGenotype {
    /// The called allele sequences
    alleles: Vec<Vec<u8>>
}

impl DiploidGenotype {
    /// Constructor
    /// # Arguments
    /// * `alleles` - the called allele sequences, must be 1 or 2 of them
    /// # Errors
    /// * if the call count is 0 or greater than 2
    pub fn new(alleles: Vec<Vec<u8>>) -> Result<Self, PopulationError> {
        if alleles.is_empty() || alleles.len() > 2 {
            return Err(PopulationError::InvalidAlleleCount { count: alleles.len() });
        }
        Ok(Self { alleles })
    }

    /// Borrowed view of the calls, in the shape the classifier wants
    pub fn called_alleles(&self) -> Vec<&[u8]> {
        self.alleles.iter().map(|a| a.as_slice()).collect()
    }

    pub fn len(&self) -> usize {
        self.alleles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alleles.is_empty()
    }
}

/// One variant site within a contig. The reference (frequency-source) population fills in
/// the INFO frequency fields; sample genomes fill in the genotype. Positions are 0-based.
#[derive(Clone, Debug)]
pub struct VariantRecord {
    /// 0-based position of the site on the contig
    position: u64,
    /// All allele sequences at the site, REF first
    alleles: Vec<Vec<u8>>,
    /// True if this is a single-nucleotide variant (all alleles length 1)
    is_snv: bool,
    /// True if the site passed the upstream quality filters
    passed_filters: bool,
    /// The sample's called genotype at this site, if any
    genotype: Option<DiploidGenotype>,
    /// INFO frequency fields keyed by field name, one value per ALT allele
    info: FxHashMap<String, Vec<f64>>
}

impl VariantRecord {
    /// Constructor. SNV status is derived from the allele lengths.
    /// # Arguments
    /// * `position` - 0-based position of the site
    /// * `alleles` - allele sequences, REF first; all must be non-empty
    /// # Errors
    /// * if no alleles are provided or any allele is empty
    pub fn new(position: u64, alleles: Vec<Vec<u8>>) -> Result<Self, PopulationError> {
        if alleles.is_empty() {
            return Err(PopulationError::NoAlleles);
        }
        for (index, allele) in alleles.iter().enumerate() {
            if allele.is_empty() {
                return Err(PopulationError::EmptyAllele { index });
            }
        }

        let is_snv = alleles.iter().all(|a| a.len() == 1);
        Ok(Self {
            position,
            alleles,
            is_snv,
            passed_filters: true,
            genotype: None,
            info: Default::default()
        })
    }

    /// Marks whether the site passed upstream quality filters
    pub fn set_filter_status(&mut self, passed: bool) {
        self.passed_filters = passed;
    }

    /// Attaches a sample genotype to this site
    pub fn set_genotype(&mut self, genotype: DiploidGenotype) {
        self.genotype = Some(genotype);
    }

    /// Stores an INFO frequency field, one value per ALT allele
    /// # Arguments
    /// * `field_name` - the INFO field name, e.g. "AF_afr"
    /// * `values` - the per-ALT frequency values
    pub fn add_info_field(&mut self, field_name: String, values: Vec<f64>) {
        self.info.insert(field_name, values);
    }

    /// Looks up the stored values for an INFO field by name
    pub fn info_values(&self, field_name: &str) -> Option<&[f64]> {
        self.info.get(field_name).map(|v| v.as_slice())
    }

    /// Looks up a single per-ALT frequency value
    /// # Arguments
    /// * `field_name` - the INFO field name
    /// * `alt_index` - 0-based index over the ALT alleles
    pub fn frequency(&self, field_name: &str, alt_index: usize) -> Option<f64> {
        self.info.get(field_name).and_then(|v| v.get(alt_index)).copied()
    }

    // getters
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn alleles(&self) -> &[Vec<u8>] {
        &self.alleles
    }

    /// The ALT alleles, i.e. everything after REF
    pub fn alt_alleles(&self) -> &[Vec<u8>] {
        &self.alleles[1..]
    }

    pub fn is_snv(&self) -> bool {
        self.is_snv
    }

    pub fn passed_filters(&self) -> bool {
        self.passed_filters
    }

    pub fn genotype(&self) -> Option<&DiploidGenotype> {
        self.genotype.as_ref()
    }
}

/// A contig holding variants in strictly increasing position order, enabling
/// binary-search lookup by offset.
#[derive(Clone, Debug, Default)]
pub struct Contig {
    /// Contig name, e.g. "chr1"
    name: String,
    /// Variants sorted by position
    variants: Vec<VariantRecord>
}

impl Contig {
    /// Constructor
    pub fn new(name: String) -> Self {
        Self {
            name,
            variants: vec![]
        }
    }

    /// Appends a variant, enforcing the sorted-position invariant
    /// # Arguments
    /// * `variant` - the record to append, must be strictly after the last one
    /// # Errors
    /// * if the position is not strictly greater than the previous variant's
    pub fn add_variant(&mut self, variant: VariantRecord) -> Result<(), PopulationError> {
        if let Some(last) = self.variants.last() {
            if variant.position() <= last.position() {
                return Err(PopulationError::UnsortedVariant {
                    position: variant.position(),
                    previous: last.position()
                });
            }
        }
        self.variants.push(variant);
        Ok(())
    }

    /// Binary-search lookup of the variant at an exact position
    pub fn variant_at(&self, position: u64) -> Option<&VariantRecord> {
        self.variants.binary_search_by_key(&position, |v| v.position())
            .ok()
            .map(|i| &self.variants[i])
    }

    /// The position just past the final variant, or 0 for an empty contig
    pub fn end_position(&self) -> u64 {
        self.variants.last().map(|v| v.position() + 1).unwrap_or(0)
    }

    // getters
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn variants(&self) -> &[VariantRecord] {
        &self.variants
    }
}

/// One genome: an identifier plus its per-contig variant records.
#[derive(Clone, Debug, Default)]
pub struct Genome {
    /// Sample / genome identifier
    identifier: String,
    /// The contigs, in insertion order
    contigs: Vec<Contig>
}

impl Genome {
    /// Constructor
    pub fn new(identifier: String) -> Self {
        Self {
            identifier,
            contigs: vec![]
        }
    }

    /// Adds a contig, rejecting duplicate names
    pub fn add_contig(&mut self, contig: Contig) -> Result<(), PopulationError> {
        if self.contigs.iter().any(|c| c.name() == contig.name()) {
            return Err(PopulationError::DuplicateContig {
                identifier: self.identifier.clone(),
                contig: contig.name().to_string()
            });
        }
        self.contigs.push(contig);
        Ok(())
    }

    /// Finds a contig by name
    pub fn contig(&self, name: &str) -> Option<&Contig> {
        self.contigs.iter().find(|c| c.name() == name)
    }

    /// Mutable lookup, used while loading
    pub fn contig_mut(&mut self, name: &str) -> Option<&mut Contig> {
        self.contigs.iter_mut().find(|c| c.name() == name)
    }

    /// Returns the single contig of this genome, or an error if there is not exactly one.
    /// # Errors
    /// * if the genome holds zero or multiple contigs
    pub fn single_contig(&self) -> Result<&Contig, PopulationError> {
        if self.contigs.len() != 1 {
            return Err(PopulationError::NotSingleContig {
                identifier: self.identifier.clone(),
                count: self.contigs.len()
            });
        }
        Ok(&self.contigs[0])
    }

    /// The sample's genotype at (contig, position), if a record with a call exists
    pub fn genotype_at(&self, contig_name: &str, position: u64) -> Option<&DiploidGenotype> {
        self.contig(contig_name)
            .and_then(|c| c.variant_at(position))
            .and_then(|v| v.genotype())
    }

    // getters
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn contigs(&self) -> &[Contig] {
        &self.contigs
    }
}

/// A named collection of genomes. Both the frequency-source reference (one pooled genome)
/// and the diploid sample set are represented with this type.
#[derive(Clone, Debug, Default)]
pub struct Population {
    /// Population name, often derived from the source filename
    name: String,
    /// All genomes in the population
    genomes: Vec<Genome>
}

impl Population {
    /// Constructor
    pub fn new(name: String) -> Self {
        Self {
            name,
            genomes: vec![]
        }
    }

    /// Adds a genome to the population
    pub fn add_genome(&mut self, genome: Genome) {
        self.genomes.push(genome);
    }

    /// Finds a genome by identifier
    pub fn genome(&self, identifier: &str) -> Option<&Genome> {
        self.genomes.iter().find(|g| g.identifier() == identifier)
    }

    /// Returns the single genome of this population, or an error if there is not exactly one.
    /// Frequency-source references are required to be pooled into one genome.
    /// # Errors
    /// * if the population holds zero or multiple genomes
    pub fn single_genome(&self) -> Result<&Genome, PopulationError> {
        if self.genomes.len() != 1 {
            return Err(PopulationError::NotSingleGenome {
                name: self.name.clone(),
                count: self.genomes.len()
            });
        }
        Ok(&self.genomes[0])
    }

    // getters
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn genomes(&self) -> &[Genome] {
        &self.genomes
    }

    pub fn len(&self) -> usize {
        self.genomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.genomes.is_empty()
    }
}
