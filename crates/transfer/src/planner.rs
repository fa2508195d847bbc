use crate::TransferError;

/// Byte range `[byte_start, byte_end)` of one part.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartDescriptor {
    /// 1-based.
    pub part_number: u32,
    pub byte_start: u64,
    pub byte_end: u64,
}

impl PartDescriptor {
    /// Size of the part in bytes.
    pub fn len(&self) -> u64 {
        self.byte_end - self.byte_start
    }

    pub fn is_empty(&self) -> bool {
        self.byte_end == self.byte_start
    }
}

/// Ordered, contiguous split of a file into parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartPlan {
    part_size: u64,
    parts: Vec<PartDescriptor>,
}

/// Splits `file_size` bytes into `ceil(file_size / part_size)` parts.
///
/// Part `n` covers `[(n-1)*part_size, min(n*part_size, file_size))`. Only
/// the last part may be shorter than `part_size`. A zero-byte file yields an
/// empty plan; callers reject it before planning.
pub fn plan(file_size: u64, part_size: u64) -> Result<PartPlan, TransferError> {
    if part_size == 0 {
        return Err(TransferError::InvalidConfiguration(
            "part size must be a positive byte count".into(),
        ));
    }

    let count = file_size.div_ceil(part_size);
    if count > u64::from(u32::MAX) {
        return Err(TransferError::InvalidConfiguration(format!(
            "{count} parts exceed the maximum part number"
        )));
    }

    let parts = (1..=count as u32)
        .map(|part_number| {
            let byte_start = u64::from(part_number - 1) * part_size;
            PartDescriptor {
                part_number,
                byte_start,
                byte_end: byte_start.saturating_add(part_size).min(file_size),
            }
        })
        .collect();

    Ok(PartPlan {
        part_size,
        parts,
    })
}

impl PartPlan {
    pub fn part_size(&self) -> u64 {
        self.part_size
    }

    /// Number of parts.
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn parts(&self) -> &[PartDescriptor] {
        &self.parts
    }

    /// Looks up a part by its 1-based number.
    pub fn get(&self, part_number: u32) -> Option<&PartDescriptor> {
        let idx = usize::try_from(part_number).ok()?.checked_sub(1)?;
        self.parts.get(idx)
    }

    /// Total bytes covered by the given part numbers.
    ///
    /// Numbers outside the plan are ignored.
    pub fn bytes_for<I>(&self, part_numbers: I) -> u64
    where
        I: IntoIterator<Item = u32>,
    {
        part_numbers
            .into_iter()
            .filter_map(|n| self.get(n))
            .map(PartDescriptor::len)
            .sum()
    }
}
