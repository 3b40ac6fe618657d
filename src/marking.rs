use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Display, Formatter};

#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Marking {
    pub(crate) place2token: Vec<u64>, //for each place: number of tokens in that place
}

impl Marking {
    pub fn new(size: usize) -> Self {
        Marking {
            place2token: vec![0; size],
        }
    }

    pub fn get_place2token(&self) -> &Vec<u64> {
        &self.place2token
    }

    pub fn from_vec(place2token: Vec<u64>) -> Self {
        Marking { place2token }
    }

    pub fn get_number_of_places(&self) -> usize {
        self.place2token.len()
    }

    pub fn get_tokens(&self, place: usize) -> u64 {
        self.place2token.get(place).copied().unwrap_or(0)
    }

    pub fn set_tokens(&mut self, place: usize, tokens: u64) -> Result<()> {
        match self.place2token.get_mut(place) {
            Some(count) => {
                *count = tokens;
                Ok(())
            }
            None => Err(anyhow!(
                "non-existing place {} referenced, while there are {}",
                place,
                self.place2token.len()
            )),
        }
    }

    pub fn increase(&mut self, place: usize, amount: u64) -> Result<()> {
        if self.place2token[place] > u64::MAX - amount {
            return Err(anyhow!(
                "tried to put too many tokens in a marking for place {}",
                place
            ));
        }

        self.place2token[place] += amount;
        Ok(())
    }

    pub fn decrease(&mut self, place: usize, amount: u64) -> Result<()> {
        if self.place2token[place] < amount {
            return Err(anyhow!(
                "tried to obtain a negative number of tokens in a marking for place {}",
                place
            ));
        }
        self.place2token[place] -= amount;
        Ok(())
    }

    pub fn add_place(&mut self) {
        self.place2token.push(0);
    }

    pub fn number_of_tokens(&self) -> u64 {
        self.place2token.iter().sum()
    }

    /**
     * Returns whether all places hold at least the given number of tokens.
     */
    pub fn covers(&self, places: &[usize], cardinalities: &[u64]) -> bool {
        places
            .iter()
            .zip(cardinalities.iter())
            .all(|(place, cardinality)| self.place2token[*place] >= *cardinality)
    }
}

impl From<Vec<u64>> for Marking {
    fn from(value: Vec<u64>) -> Self {
        Self { place2token: value }
    }
}

impl Display for Marking {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{")?;
        let mut first = true;
        for (place, multiplicity) in self.place2token.iter().enumerate() {
            if *multiplicity > 0 {
                if !first {
                    write!(f, ", ")?;
                }
                first = false;
                write!(f, "{}:{}", place, multiplicity)?;
            }
        }
        write!(f, "}}")
    }
}

impl Debug for Marking {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::Marking;

    #[test]
    fn marking_never_negative() {
        let mut marking = Marking::from_vec(vec![1, 0]);
        assert!(marking.decrease(0, 2).is_err());
        assert_eq!(marking.get_tokens(0), 1);
        marking.decrease(0, 1).unwrap();
        assert_eq!(marking.get_tokens(0), 0);
    }

    #[test]
    fn marking_overflow() {
        let mut marking = Marking::from_vec(vec![u64::MAX - 1]);
        assert!(marking.increase(0, 2).is_err());
        marking.increase(0, 1).unwrap();
        assert_eq!(marking.get_tokens(0), u64::MAX);
    }

    #[test]
    fn marking_display() {
        let marking = Marking::from_vec(vec![0, 2, 0, 1]);
        assert_eq!(marking.to_string(), "{1:2, 3:1}");
    }
}
