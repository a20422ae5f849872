//! Small synthetic catalog shared by unit tests.

use crate::catalog::Catalog;
use crate::scope::Scope;

pub(crate) const SAMPLE_CATALOG: &str = r#"
version: 1
name: sample
typing:
  - prefix: Q18a_
    value_type: integer
  - prefix: Q19_
    value_type: decimal
questions:
  - id: Q1_A
    module: Admin
    sub_module: Entity Details
    section: A
    sub_section: Entity Details
    schema_path: section_a.entity_details.Q1_A
    value_type: text
  - id: Q3_A
    module: Admin
    sub_module: Entity Details
    section: A
    sub_section: Entity Details
    schema_path: section_a.entity_details.Q3_A
    value_type: integer
  - id: Q18a
    module: Workforce
    sub_module: Workforce Details
    section: A
    sub_section: Employees
    schema_path_composite: section_a.employees.Q18a
    subcomponents:
      - Q18a_permanent_employees_male
      - Q18a_permanent_employees_female
      - Q18a_contractual_workers_male
      - Q18a_contractual_workers_female
  - id: Q18a_permanent_employees_male
    module: Workforce
    sub_module: Workforce Details
    section: A
    sub_section: Employees
    schema_path: section_a.employees.Q18a.permanent_employees.male
  - id: Q18a_permanent_employees_female
    module: Workforce
    sub_module: Workforce Details
    section: A
    sub_section: Employees
    schema_path: section_a.employees.Q18a.permanent_employees.female
  - id: Q18a_contractual_workers_male
    module: Workforce
    sub_module: Workforce Details
    section: A
    sub_section: Employees
    schema_path: section_a.employees.Q18a.contractual_workers.male
  - id: Q18a_contractual_workers_female
    module: Workforce
    sub_module: Workforce Details
    section: A
    sub_section: Employees
    schema_path: section_a.employees.Q18a.contractual_workers.female
  - id: Q19
    module: Workforce
    sub_module: Workforce Details
    section: A
    sub_section: Employees
    schema_path_composite: section_a.employees.Q19
    subcomponents:
      - Q19_board_women
      - Q19_management_women
  - id: Q19_board_women
    module: Workforce
    sub_module: Workforce Details
    section: A
    sub_section: Employees
    schema_path: section_a.employees.Q19.board_women
  - id: Q19_management_women
    module: Workforce
    sub_module: Workforce Details
    section: A
    sub_section: Employees
    schema_path: section_a.employees.Q19.management_women
  - id: Q2_P3
    module: Workforce
    sub_module: Employee Well-Being
    section: C
    principle: Principle 3
    schema_path: section_c.principle_3.Q2_P3
  - id: Q1_P6
    module: Environment
    sub_module: Energy
    section: C
    principle: Principle 6
    schema_path: section_c.principle_6.Q1_P6
"#;

pub(crate) fn sample_catalog() -> Catalog {
    Catalog::from_yaml_str(SAMPLE_CATALOG).unwrap()
}

pub(crate) fn sample_scope() -> Scope {
    Scope::new("acme", "plant-1", "2024-2025").unwrap()
}
