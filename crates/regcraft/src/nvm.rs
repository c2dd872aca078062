//! EEPROM programming through an indirect register port.
//!
//! Devices like the CDCE6214 expose their configuration EEPROM through a pair of
//! pointer/data registers for each direction. The pointer auto-increments after every
//! data access, so an image is streamed as one contiguous run of words from address 0.
//! Timing between accesses and power cycling are left to the [Transport].

use crate::{
    Address,
    bits::Width,
    errors::{BitError, NvmError},
    image::{Image, WordDiff},
    transport::Transport,
};

/// Register addresses of an indirect EEPROM port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NvmPort {
    /// Register holding the EEPROM lock field.
    pub lock_register: Address,
    /// Word written to the lock register to allow EEPROM writes.
    pub unlock_word: u64,
    pub write_pointer: Address,
    pub write_data: Address,
    pub read_pointer: Address,
    pub read_data: Address,
    /// Number of words in the EEPROM.
    pub word_count: usize,
}

impl NvmPort {
    /// CDCE6214: EE_LOCK = 0x5 in R15[15:12], 64 EEPROM words.
    pub const CDCE6214: NvmPort = NvmPort {
        lock_register: 0x0F,
        unlock_word: 0x5000,
        write_pointer: 0x0D,
        write_data: 0x0E,
        read_pointer: 0x0B,
        read_data: 0x0C,
        word_count: 64,
    };
}

/// Bits used to copy the live registers into the EEPROM page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitSequence {
    /// Register and bit that start a VCO recalibration.
    pub recal_register: Address,
    pub recal_bit: u32,
    pub commit_register: Address,
    /// Selects the EEPROM page the commit is written to.
    pub page_bit: u32,
    pub commit_bit: u32,
}

impl CommitSequence {
    /// CDCE6214: RECAL is R0[4], REGCOMMIT_PAGE is R3[9], REGCOMMIT is R3[10].
    pub const CDCE6214: CommitSequence = CommitSequence {
        recal_register: 0x00,
        recal_bit: 4,
        commit_register: 0x03,
        page_bit: 9,
        commit_bit: 10,
    };
}

fn unlock<T: Transport>(transport: &mut T, port: &NvmPort) -> Result<(), NvmError> {
    log::debug!(
        "unlock EEPROM: register {:#x} = {:#x}",
        port.lock_register,
        port.unlock_word
    );
    transport.write(port.lock_register, port.unlock_word)?;
    Ok(())
}

fn single_bit(bit: u32) -> Result<u64, BitError> {
    1u64.checked_shl(bit)
        .ok_or(BitError::IndexOutOfRange { bit, width: 64 })
}

/// Unlocks the EEPROM and streams `image` into it from address 0.
///
/// The image must cover addresses `0..n` without gaps and fit in the EEPROM.
pub fn write_image<T: Transport>(transport: &mut T, port: &NvmPort, image: &Image) -> Result<(), NvmError> {
    let words = image.to_words()?;
    if words.len() > port.word_count {
        return Err(NvmError::ImageTooLarge {
            words: words.len(),
            capacity: port.word_count,
        });
    }

    unlock(transport, port)?;
    transport.write(port.write_pointer, 0)?;

    for (address, word) in words.iter().enumerate() {
        log::trace!("EEPROM word {address:#x} = {word:#x}");
        transport.write(port.write_data, *word)?;
    }

    log::info!("wrote {} EEPROM words", words.len());
    Ok(())
}

/// Reads the whole EEPROM, one word per address.
pub fn read_image<T: Transport>(transport: &mut T, port: &NvmPort, width: Width) -> Result<Image, NvmError> {
    transport.write(port.read_pointer, 0)?;

    let mut image = Image::new(width);
    for address in 0..port.word_count {
        let word = transport.read(port.read_data)?;
        log::trace!("EEPROM word {address:#x} read {word:#x}");
        image.set(address as Address, word)?;
    }

    Ok(image)
}

/// Reads the EEPROM back and compares it with `written`.
///
/// Only the addresses `written` covers are compared.
pub fn verify_image<T: Transport>(
    transport: &mut T,
    port: &NvmPort,
    written: &Image,
) -> Result<Vec<WordDiff>, NvmError> {
    let readback = read_image(transport, port, written.width())?;

    let mut covered = Image::new(written.width());
    for (address, _) in written.iter() {
        if let Some(word) = readback.get(address) {
            covered.set(address, word)?;
        }
    }

    let diffs = written.diff(&covered);
    for diff in &diffs {
        log::warn!(
            "EEPROM word {:#x}: wrote {:?}, read {:?}",
            diff.address,
            diff.expected,
            diff.actual
        );
    }

    Ok(diffs)
}

/// Commits the live register contents to the EEPROM.
///
/// Sets the recalibration bit, selects page 1, unlocks the EEPROM and sets the commit
/// bit while keeping the page selection.
pub fn commit_registers<T: Transport>(
    transport: &mut T,
    port: &NvmPort,
    sequence: &CommitSequence,
) -> Result<(), NvmError> {
    let recal = transport.read(sequence.recal_register)? | single_bit(sequence.recal_bit)?;
    transport.write(sequence.recal_register, recal)?;

    let page = single_bit(sequence.page_bit)?;
    transport.write(sequence.commit_register, page)?;

    unlock(transport, port)?;

    let commit = page | single_bit(sequence.commit_bit)?;
    transport.write(sequence.commit_register, commit)?;

    log::info!("register commit issued");
    Ok(())
}
