pub mod provider;
pub mod tables;

pub use provider::{
    get_tax_year_data, FixedTaxYearData, PublishedTaxTables, TaxDataProvider, TaxYearData,
};
pub use tables::{
    CorporateRates, DividendGrossUp, HealthPremiumBand, PayrollParameters, PersonalTaxSchedule,
    ProvincialIndexation, RetirementParameters, Surtax, TaxBracket,
};
