use crate::models::{MetricColumns, Metrics, Record};

/// Running sums over a set of records. Folding records one at a time and
/// merging partial totals give the same result, which the cumulative date
/// view relies on.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Totals {
    pub order_count: usize,
    pub denominator: f64,
    pub detractors: f64,
    pub promoter_sum: f64,
}

impl Totals {
    pub fn add(&mut self, record: &Record) {
        self.order_count += 1;
        self.denominator += record.denominator_weight;
        self.detractors += f64::from(record.detractor.value());
        self.promoter_sum += record.promoter_score * record.denominator_weight;
    }

    pub fn merge(&mut self, other: &Totals) {
        self.order_count += other.order_count;
        self.denominator += other.denominator;
        self.detractors += other.detractors;
        self.promoter_sum += other.promoter_sum;
    }

    pub fn metrics(&self) -> Metrics {
        let (detractor_rate, promoter_rate, nps) = if self.denominator > 0.0 {
            let detractor_rate = self.detractors / self.denominator;
            let promoter_rate = self.promoter_sum / self.denominator;
            (
                detractor_rate,
                promoter_rate,
                (promoter_rate - detractor_rate) * 100.0,
            )
        } else {
            (0.0, 0.0, 0.0)
        };

        Metrics {
            order_count: self.order_count,
            effective_denominator: self.denominator,
            detractor_count: self.detractors.trunc() as i64,
            promoter_score_sum: self.promoter_sum,
            detractor_rate,
            promoter_rate,
            nps,
        }
    }
}

impl<'a> FromIterator<&'a Record> for Totals {
    fn from_iter<I: IntoIterator<Item = &'a Record>>(iter: I) -> Self {
        let mut totals = Totals::default();
        for record in iter {
            totals.add(record);
        }
        totals
    }
}

pub fn compute<'a, I>(records: I) -> Metrics
where
    I: IntoIterator<Item = &'a Record>,
{
    records.into_iter().collect::<Totals>().metrics()
}

impl Metrics {
    pub fn reported(&self) -> MetricColumns {
        MetricColumns {
            order_count: self.order_count,
            effective_denominator: round_to(self.effective_denominator, 2),
            detractor_count: self.detractor_count,
            promoter_score: round_to(self.promoter_score_sum, 2),
            detractor_rate: round_to(self.detractor_rate * 100.0, 2),
            promoter_rate: round_to(self.promoter_rate * 100.0, 2),
            nps: round_to(self.nps, 2),
        }
    }
}

/// Round to `places` decimals from the exact binary value, the way decimal
/// formatting does. Never returns negative zero.
pub fn round_to(value: f64, places: usize) -> f64 {
    if !value.is_finite() {
        return value;
    }
    format!("{:.*}", places, value)
        .parse::<f64>()
        .map(|rounded| rounded + 0.0)
        .unwrap_or(value)
}
