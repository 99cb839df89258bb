use std::fmt;

/// Which days of the week (Monday first) a record applies to. `None` is an
/// unknown day, which is what an absent or blank position decodes to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Days([Option<bool>; 7]);

impl Days {
    pub fn new(days: [Option<bool>; 7]) -> Self {
        Days(days)
    }

    /// Decode a run of `0`/`1` characters. Short input leaves the remaining
    /// days unknown and anything past the seventh character is ignored.
    pub fn from_cif(value: &str) -> Self {
        let mut days = Days::default();
        days.set_from_cif(value);
        days
    }

    pub fn from_slice(value: &[Option<bool>]) -> Self {
        let mut days = Days::default();
        days.set(value);
        days
    }

    pub fn set(&mut self, value: &[Option<bool>]) {
        for (i, day) in self.0.iter_mut().enumerate() {
            *day = value.get(i).copied().flatten();
        }
    }

    pub fn set_from_cif(&mut self, value: &str) {
        let mut chars = value.chars();
        for day in self.0.iter_mut() {
            *day = match chars.next() {
                Some('1') => Some(true),
                Some(x) if x.is_whitespace() => None,
                Some(_) => Some(false),
                None => None,
            };
        }
    }

    pub fn to_cif(&self) -> String {
        self.0
            .iter()
            .map(|day| if *day == Some(true) { '1' } else { '0' })
            .collect()
    }

    /// The 7 column form used inside a record, blank when nothing is known.
    pub fn to_cif_field(&self) -> String {
        if self.is_unknown() {
            " ".repeat(7)
        } else {
            self.to_cif()
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.0.iter().all(|day| day.is_none())
    }

    pub fn as_array(&self) -> &[Option<bool>; 7] {
        &self.0
    }

    pub fn mondays(&self) -> Option<bool> {
        self.0[0]
    }

    pub fn tuesdays(&self) -> Option<bool> {
        self.0[1]
    }

    pub fn wednesdays(&self) -> Option<bool> {
        self.0[2]
    }

    pub fn thursdays(&self) -> Option<bool> {
        self.0[3]
    }

    pub fn fridays(&self) -> Option<bool> {
        self.0[4]
    }

    pub fn saturdays(&self) -> Option<bool> {
        self.0[5]
    }

    pub fn sundays(&self) -> Option<bool> {
        self.0[6]
    }
}

impl fmt::Display for Days {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.to_cif())
    }
}
