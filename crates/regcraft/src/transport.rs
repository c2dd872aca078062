//! Register access to a live device.
//!
//! A [Transport] reads and writes single register words. Implementations are blocking
//! and the helpers here never retry a failed access.

use std::collections::BTreeMap;

use crate::{
    Address,
    bits::Width,
    descriptor::RegisterMap,
    errors::TransportError,
    store::RegisterStore,
};

/// Word-wide register access to a device.
pub trait Transport {
    /// Writes `word` to `address`, returning the device's response word.
    fn write(&mut self, address: Address, word: u64) -> Result<u64, TransportError>;

    /// Reads the word at `address`.
    fn read(&mut self, address: Address) -> Result<u64, TransportError>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn write(&mut self, address: Address, word: u64) -> Result<u64, TransportError> {
        (**self).write(address, word)
    }

    fn read(&mut self, address: Address) -> Result<u64, TransportError> {
        (**self).read(address)
    }
}

/// One access seen by a [MemoryTransport].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Write { address: Address, word: u64 },
    Read { address: Address },
}

/// In-memory register file. Unwritten registers read as 0.
///
/// Every access is recorded, which makes it usable for dry runs.
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    width: Width,
    words: BTreeMap<Address, u64>,
    accesses: Vec<Access>,
}

impl MemoryTransport {
    pub fn new(width: Width) -> Self {
        Self {
            width,
            words: BTreeMap::new(),
            accesses: Vec::new(),
        }
    }

    /// Current word at `address` without recording an access.
    pub fn peek(&self, address: Address) -> u64 {
        self.words.get(&address).copied().unwrap_or(0)
    }

    /// Sets a word without recording an access.
    pub fn poke(&mut self, address: Address, word: u64) -> Result<(), TransportError> {
        self.words.insert(address, self.width.check(word)?);
        Ok(())
    }

    pub fn accesses(&self) -> &[Access] {
        &self.accesses
    }

    /// Addresses written, in order.
    pub fn writes(&self) -> impl Iterator<Item = (Address, u64)> + '_ {
        self.accesses.iter().filter_map(|access| match *access {
            Access::Write { address, word } => Some((address, word)),
            Access::Read { .. } => None,
        })
    }
}

impl Transport for MemoryTransport {
    fn write(&mut self, address: Address, word: u64) -> Result<u64, TransportError> {
        let word = self.width.check(word)?;
        self.accesses.push(Access::Write { address, word });
        self.words.insert(address, word);
        Ok(word)
    }

    fn read(&mut self, address: Address) -> Result<u64, TransportError> {
        self.accesses.push(Access::Read { address });
        Ok(self.peek(address))
    }
}

/// Writes every writable register of `store` in ascending address order.
///
/// Returns the registers that were skipped because the descriptor does not declare
/// them or declares them without write access.
pub fn program_registers<T: Transport>(
    transport: &mut T,
    map: &RegisterMap,
    store: &RegisterStore,
) -> Result<Vec<Address>, TransportError> {
    let (writable, skipped) = map.registers_for_write(store);

    for (address, word) in writable.iter() {
        log::debug!("write register {address:#x} = {word:#x}");
        transport.write(address, word)?;
    }

    Ok(skipped)
}

/// Reads every readable register the descriptor declares into a new store.
pub fn readback_registers<T: Transport>(
    transport: &mut T,
    map: &RegisterMap,
) -> Result<RegisterStore, TransportError> {
    let mut store = RegisterStore::new(map.width());

    for register in map.registers().filter(|r| r.mode.is_readable()) {
        let word = transport.read(register.address)?;
        log::debug!("read register {:#x} = {word:#x}", register.address);
        store.set(register.address, word)?;
    }

    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        descriptor::{FragmentRecord, RegisterRecord},
        transform::TranslationRegistry,
    };

    fn map() -> RegisterMap {
        RegisterMap::compile(
            &[
                RegisterRecord::new("0x0", "RW", vec![FragmentRecord::new("RECAL[4]", 4, 4)]),
                RegisterRecord::new("0x2", "W", vec![]),
                RegisterRecord::new("0x7", "R", vec![FragmentRecord::new("STATUS[1:0]", 0, 1)]),
                RegisterRecord::new("0x8", "Reserved", vec![]),
            ],
            Width::W16,
            &TranslationRegistry::new(),
        )
        .unwrap()
    }

    #[test]
    fn test_memory_transport() {
        let mut transport = MemoryTransport::new(Width::W16);
        assert_eq!(transport.write(3, 0xBEEF).unwrap(), 0xBEEF);
        assert_eq!(transport.read(3).unwrap(), 0xBEEF);
        assert_eq!(transport.read(4).unwrap(), 0);
        assert!(transport.write(3, 0x1_0000).is_err());

        assert_eq!(
            transport.accesses(),
            &[
                Access::Write {
                    address: 3,
                    word: 0xBEEF
                },
                Access::Read { address: 3 },
                Access::Read { address: 4 },
            ]
        );
    }

    #[test]
    fn test_program_registers() {
        let map = map();
        let store =
            RegisterStore::from_pairs(Width::W16, [(7, 0x3), (2, 0x22), (0, 0x10), (9, 0x1)]).unwrap();
        let mut transport = MemoryTransport::new(Width::W16);

        let skipped = program_registers(&mut transport, &map, &store).unwrap();

        assert_eq!(skipped, vec![7, 9]);
        assert_eq!(transport.writes().collect::<Vec<_>>(), vec![(0, 0x10), (2, 0x22)]);
    }

    #[test]
    fn test_readback_registers() {
        let map = map();
        let mut transport = MemoryTransport::new(Width::W16);
        transport.poke(0, 0x1010).unwrap();
        transport.poke(2, 0x2222).unwrap();
        transport.poke(7, 0x0003).unwrap();

        let store = readback_registers(&mut transport, &map).unwrap();

        assert_eq!(store.get(0), 0x1010);
        assert_eq!(store.get(7), 0x0003);
        assert!(!store.contains(2));
        assert!(!store.contains(8));
        assert_eq!(
            transport.accesses(),
            &[Access::Read { address: 0 }, Access::Read { address: 7 }]
        );
    }
}
