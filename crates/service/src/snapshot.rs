use std::fmt;
use std::str::FromStr;

use kamikaze_common::PackageError;
use kamikaze_storage::Package;

/// Em que sentido do score a fila é varrida.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PriorityOrder {
    /// Varredura ascendente: o menor score não expirado vence.
    #[default]
    LowestScoreFirst,
    /// Varredura descendente: o maior score não expirado vence.
    HighestScoreFirst,
}

impl PriorityOrder {
    /// Ordena os pacotes na ordem de varredura. A ordenação é estável, então
    /// scores iguais mantêm a ordem em que o store os devolveu.
    pub fn sort(self, packages: &mut [Package]) {
        match self {
            PriorityOrder::LowestScoreFirst => packages.sort_by(|a, b| a.cmp_score(b)),
            PriorityOrder::HighestScoreFirst => packages.sort_by(|a, b| b.cmp_score(a)),
        }
    }
}

impl FromStr for PriorityOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "lowest" => Ok(PriorityOrder::LowestScoreFirst),
            "highest" => Ok(PriorityOrder::HighestScoreFirst),
            _ => Err(format!("valor inválido: '{s}'. Use: lowest, highest")),
        }
    }
}

impl fmt::Display for PriorityOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PriorityOrder::LowestScoreFirst => f.write_str("lowest"),
            PriorityOrder::HighestScoreFirst => f.write_str("highest"),
        }
    }
}

/// Resultado de um passe de avaliação.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueueSnapshot {
    /// Pacotes expirados encontrados antes do sobrevivente, na ordem de varredura.
    pub expired: Vec<Package>,
    /// Primeiro pacote não expirado na ordem de varredura.
    pub survivor: Option<Package>,
}

/// Decodifica todas as entradas. Uma entrada corrompida aborta tudo.
pub fn decode_entries<I>(entries: I) -> Result<Vec<Package>, PackageError>
where
    I: IntoIterator<Item = (String, f64)>,
{
    entries
        .into_iter()
        .map(|(entry, score)| Package::decode(&entry, score))
        .collect()
}

/// Separa as entradas em expiradas e sobrevivente no instante `now`.
///
/// A varredura para no primeiro pacote vivo; os que vêm depois dele não são
/// avaliados neste passe.
pub fn evaluate<I>(entries: I, now: f64, order: PriorityOrder) -> Result<QueueSnapshot, PackageError>
where
    I: IntoIterator<Item = (String, f64)>,
{
    let mut packages = decode_entries(entries)?;
    order.sort(&mut packages);

    let mut snapshot = QueueSnapshot::default();
    for package in packages {
        if package.is_expired(now) {
            snapshot.expired.push(package);
        } else {
            snapshot.survivor = Some(package);
            break;
        }
    }
    Ok(snapshot)
}

/// Tempo até o sobrevivente expirar; `None` sem sobrevivente ou sem expiração.
pub fn time_until_expiry(survivor: Option<&Package>, now: f64) -> Option<f64> {
    survivor.and_then(|p| p.ttl(now))
}
